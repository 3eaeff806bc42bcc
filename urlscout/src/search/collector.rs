use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::errors::FetchError;
use crate::results::{ResultSet, TargetResult};

/// Gathers exactly one result per target.
///
/// Stops listening once every target has reported. If the channel closes first,
/// the targets that never reported are recorded as [`FetchError::WorkerLost`]
/// instead of waiting forever.
pub async fn collect(
    mut results: mpsc::UnboundedReceiver<TargetResult>,
    targets: &[String],
) -> ResultSet {
    let expected = targets.len();
    let mut reported = vec![false; expected];
    let mut set = ResultSet::with_capacity(expected);

    while set.len() < expected {
        let Some(result) = results.recv().await else {
            warn!(
                "Result channel closed after {} of {} results",
                set.len(),
                expected
            );
            for (index, _) in reported.iter().enumerate().filter(|(_, seen)| !**seen) {
                set.add_result(TargetResult::failed(
                    index,
                    targets[index].clone(),
                    FetchError::WorkerLost,
                ));
            }
            break;
        };

        match reported.get_mut(result.index) {
            Some(seen) if !*seen => {
                *seen = true;
                trace!("Collected {} ({}/{})", result.target, set.len() + 1, expected);
                set.add_result(result);
            }
            _ => warn!("Ignoring unexpected result for index {}", result.index),
        }
    }

    set
}
