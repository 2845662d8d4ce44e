//! The shared confirmation channel (§4.9/§5): decouples interceptor threads, which may
//! run many requests in parallel, from the single PTY-driven UI prompt.

use pmg_common::{AnalysisVerdict, PackageVersion};
use tokio::sync::mpsc;

/// Channel capacity from §5 ("bounded back-pressure, capacity 10").
pub const CHANNEL_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub package: PackageVersion,
    pub verdict: AnalysisVerdict,
    pub request_id: String,
}

pub type ConfirmationSender = mpsc::Sender<ConfirmationRequest>;
pub type ConfirmationReceiver = mpsc::Receiver<ConfirmationRequest>;

/// Build the shared channel; a full channel makes interceptor sends block, providing
/// the documented back-pressure.
pub fn channel() -> (ConfirmationSender, ConfirmationReceiver) {
    mpsc::channel(CHANNEL_CAPACITY)
}
