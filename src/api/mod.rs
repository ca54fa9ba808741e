// Thin namespace wrapper for API-layer components
pub mod auth {
    pub use crate::auth::*;
}

pub mod handlers {
    pub use crate::handlers::*;
}

pub mod openapi {
    pub use crate::openapi::*;
}

pub mod routes {
    pub use crate::routes::*;
}
