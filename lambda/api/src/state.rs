use std::sync::Arc;

use be3_shared::{IdentityProvider, ObjectStorage, ResellerApi, ResellerClient, UserRepository};

/// Clients built once per cold start and shared by every request
#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub users: Arc<dyn UserRepository>,
    pub reseller: ResellerClient,
    pub storage: Arc<dyn ObjectStorage>,
}

impl AppState {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        users: Arc<dyn UserRepository>,
        reseller: Arc<dyn ResellerApi>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            identity,
            users,
            reseller: ResellerClient::new(reseller),
            storage,
        }
    }
}
