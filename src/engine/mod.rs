//! Access prediction engine
//!
//! Pure, synchronous evaluation over immutable rule data: the access
//! evaluator scores one access group for one client host, and the response
//! predictor combines per-instance results into one network-wide prediction.

mod evaluator;
mod predictor;

pub use evaluator::evaluate_access;
pub use predictor::{predict_gateway_response, GatewayResponse, GatewayResponseSummary};
