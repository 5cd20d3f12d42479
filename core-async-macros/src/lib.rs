use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, ItemFn};

/// Runs an `async fn` test on the platform's executor.
///
/// `#[core_async::test(start_paused)]` starts the native runtime with a paused
/// clock: timers auto-advance whenever every task is idle. On wasm32 the flag
/// is accepted and ignored.
#[proc_macro_attribute]
pub fn test(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mode = match parse_mode(attr) {
        Ok(mode) => mode,
        Err(err) => return err.to_compile_error().into(),
    };

    let input = parse_macro_input!(item as ItemFn);

    if input.sig.asyncness.is_none() {
        return syn::Error::new_spanned(
            input.sig.fn_token,
            "core_async::test requires `async fn`",
        )
        .to_compile_error()
        .into();
    }

    let mut sync_sig = input.sig.clone();
    sync_sig.asyncness = None;
    let async_sig = input.sig.clone();

    let attrs_native = input.attrs.clone();
    let attrs_wasm = input.attrs;
    let vis_native = input.vis.clone();
    let vis_wasm = input.vis;
    let native_block = input.block.clone();
    let wasm_block = input.block;

    let runner = match mode {
        ClockMode::Realtime => quote!(core_async::runtime::block_on),
        ClockMode::Paused => quote!(core_async::runtime::block_on_paused),
    };

    let native = quote! {
        #[cfg(not(target_arch = "wasm32"))]
        #(#attrs_native)*
        #[test]
        #vis_native #sync_sig {
            #runner(async move #native_block)
        }
    };

    let wasm = quote! {
        #[cfg(target_arch = "wasm32")]
        #(#attrs_wasm)*
        #[cfg_attr(
            target_arch = "wasm32",
            core_async::test_support::wasm_bindgen_test
        )]
        #vis_wasm #async_sig #wasm_block
    };

    quote!(#native #wasm).into()
}

enum ClockMode {
    Realtime,
    Paused,
}

fn parse_mode(attr: TokenStream) -> syn::Result<ClockMode> {
    if attr.is_empty() {
        return Ok(ClockMode::Realtime);
    }

    let tokens = TokenStream2::from(attr);
    let ident: syn::Ident = syn::parse2(tokens.clone())
        .map_err(|_| syn::Error::new_spanned(&tokens, "expected `start_paused`"))?;

    if ident == "start_paused" {
        Ok(ClockMode::Paused)
    } else {
        Err(syn::Error::new_spanned(
            ident,
            "unknown core_async::test option, expected `start_paused`",
        ))
    }
}
