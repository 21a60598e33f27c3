//! Popup primitive - Acknowledge the confirmation modal

use perceiver_structural::{selectors, Check, PhaseDetector};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::{types::SendTimings, waiting::wait_until};

/// Clicks the OK button of the open confirmation popup.
///
/// Returns `false` when there is no popup, when it never offers an OK
/// button, or when the click fails.
pub async fn confirm_popup(detector: &PhaseDetector, timings: &SendTimings) -> bool {
    if !detector.is(Check::ConfirmPopup).await {
        return false;
    }

    if wait_until("popup OK button", timings.popup_ok, move || {
        detector.is(Check::ConfirmPopupOk)
    })
    .await
    .is_err()
    {
        warn!("popup has no OK button");
        return false;
    }

    info!("confirming popup");
    if let Err(err) = detector.browser().click(selectors::CONFIRM_POPUP_OK).await {
        warn!("popup OK click failed: {err}");
        return false;
    }
    sleep(timings.settle).await;
    true
}
