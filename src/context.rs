use std::{convert::Infallible, sync::Arc};

use warp::Filter;

use crate::{
    cache::cache::SessionCache, config::Config, document::render::Renderer, jwt::TokenSigner,
    store::Store,
};

/// Everything a request handler may touch, shared by all requests.
#[derive(Clone)]
pub struct Context {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<dyn SessionCache>,
    pub signer: Arc<TokenSigner>,
    pub renderer: Arc<Renderer>,
    pub config: Arc<Config>,
}

impl Context {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<dyn SessionCache>,
        signer: TokenSigner,
        renderer: Renderer,
        config: Config,
    ) -> Self {
        Self {
            store,
            sessions,
            signer: Arc::new(signer),
            renderer: Arc::new(renderer),
            config: Arc::new(config),
        }
    }
}

pub fn with_context(
    context: Context,
) -> impl Filter<Extract = (Context,), Error = Infallible> + Clone {
    warp::any().map(move || context.clone())
}
