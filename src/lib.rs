pub mod bank;
pub mod cache;
pub mod config;
pub mod creditcard;
pub mod domain {
    pub mod error;
    pub mod payment;
}
pub mod http {
    pub mod handlers {
        pub mod payments;
    }
    pub mod middleware {
        pub mod auth;
        pub mod rate_limit;
    }
}
pub mod repo {
    pub mod payments_repo;
}
pub mod resilience;
pub mod service {
    pub mod payment_service;
}

#[derive(Clone)]
pub struct AppState {
    pub payment_service: service::payment_service::PaymentService,
}
