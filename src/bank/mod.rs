use crate::domain::payment::Payment;
use anyhow::Result;
use futures::future::BoxFuture;
use std::sync::Arc;

pub mod mock;

/// Invoked on a separate task once the bank settles the payment, with the
/// final status and failure reason filled in. It may never fire.
pub type BankResultHook = Arc<dyn Fn(Payment) -> BoxFuture<'static, ()> + Send + Sync>;

/// Synchronous acknowledgement of a charge submission. `< 300` means the
/// bank accepted the charge and a callback is expected; `300-499` is a
/// client-side rejection; `>= 500` is a server-side failure.
#[derive(Debug, Clone)]
pub struct BankResponse {
    pub status_code: u16,
}

#[async_trait::async_trait]
pub trait AcquiringBank: Send + Sync {
    async fn submit(&self, payment: &Payment, on_result: BankResultHook) -> Result<BankResponse>;
}
