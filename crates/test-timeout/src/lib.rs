//! `#[tokio_timeout_test(secs)]`: an async test on its own current-thread
//! runtime, failed if it has not finished within `secs` seconds. The watchdog
//! lives outside the runtime, so a test that blocks the executor still fails.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Attribute, ItemFn, LitInt};

const DEFAULT_SECS: u64 = 60;

#[proc_macro_attribute]
pub fn tokio_timeout_test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let secs = if attr.is_empty() {
        DEFAULT_SECS
    } else {
        match parse_secs(parse_macro_input!(attr as LitInt)) {
            Ok(secs) => secs,
            Err(err) => return err.to_compile_error().into(),
        }
    };

    let ItemFn {
        attrs,
        vis,
        mut sig,
        block,
    } = parse_macro_input!(item as ItemFn);
    if sig.asyncness.take().is_none() {
        return syn::Error::new_spanned(&sig.ident, "tokio_timeout_test needs an async fn")
            .to_compile_error()
            .into();
    }
    let attrs: Vec<Attribute> = attrs.into_iter().filter(|attr| !is_tokio_test(attr)).collect();
    let name = sig.ident.to_string();
    let body = watchdog(&name, secs, quote! {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("test runtime")
            .block_on(async {
                tokio::time::timeout(limit, async move #block)
                    .await
                    .unwrap_or_else(|_| panic!("{} timed out after {:?}", #name, limit))
            })
    });

    TokenStream::from(quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            #body
        }
    })
}

fn parse_secs(lit: LitInt) -> syn::Result<u64> {
    let secs: u64 = lit.base10_parse()?;
    if secs == 0 {
        return Err(syn::Error::new_spanned(lit, "timeout must be at least one second"));
    }
    Ok(secs)
}

/// Runs `run` on a worker thread and waits at most `secs` for it.
fn watchdog(name: &str, secs: u64, run: TokenStream2) -> TokenStream2 {
    quote! {
        let limit = std::time::Duration::from_secs(#secs);
        let (done, outcome) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name(#name.to_string())
            .spawn(move || {
                let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| { #run }));
                let _ = done.send(result);
            })
            .expect("spawn test thread");
        match outcome.recv_timeout(limit) {
            Ok(Ok(_)) => {}
            Ok(Err(payload)) => std::panic::resume_unwind(payload),
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {
                panic!("{} did not finish within {:?}", #name, limit)
            }
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                panic!("{} exited without reporting", #name)
            }
        }
    }
}

fn is_tokio_test(attr: &Attribute) -> bool {
    let segments: Vec<_> = attr.path().segments.iter().map(|seg| seg.ident.to_string()).collect();
    segments == ["tokio", "test"]
}
