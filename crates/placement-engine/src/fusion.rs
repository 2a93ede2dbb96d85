//! Anchor update stream consumption

use futures::{Stream, StreamExt};
use tokio::sync::watch;

/// Feed every item of `stream` to `handler` until the stream ends or
/// `shutdown` becomes true. Returns the number of handled items.
pub async fn consume_stream<S, T, F>(
    name: &'static str,
    stream: S,
    mut shutdown: watch::Receiver<bool>,
    mut handler: F,
) -> u64
where
    S: Stream<Item = T>,
    F: FnMut(T),
{
    futures::pin_mut!(stream);
    let mut handled = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        tokio::select! {
            item = stream.next() => match item {
                Some(item) => {
                    handler(item);
                    handled += 1;
                }
                None => {
                    tracing::debug!("{} stream ended", name);
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!("Stopped consuming {} after {} updates", name, handled);
    handled
}
