//! Command-line player around [`AudioEngine`](crate::engine::AudioEngine)
//!
//! Loads one media file, reads control commands from stdin and logs the
//! playback position once per second.

pub mod commands;
pub mod session;
pub mod source;

pub use commands::{Command, SeekTarget};
pub use session::Session;
pub use source::MediaSource;

use crate::config::EngineConfig;
use anyhow::Result;
use log::{error, info, warn};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const STATUS_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// Tear the session down off the runtime: unloading joins the decode thread
    Unload,
    Quit,
}

/// Play `path` until `quit`, end of input after end of stream, or `cancel`
pub async fn run(
    path: PathBuf,
    config: EngineConfig,
    autoplay: bool,
    cancel: CancellationToken,
) -> Result<()> {
    let session = tokio::task::spawn_blocking(move || Session::load(&path, &config)).await??;
    if autoplay {
        session.play()?;
    }
    let mut session = Some(session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut status = tokio::time::interval(STATUS_INTERVAL);
    let mut eof_reported = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Player: interrupted");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) if line.trim().is_empty() => {}
                Ok(Some(line)) => match line.parse::<Command>() {
                    Ok(command) => {
                        match handle(command, &mut session) {
                            Flow::Quit => break,
                            Flow::Unload => unload(&mut session).await,
                            Flow::Continue => {}
                        }
                        // A seek may have revived a finished session
                        eof_reported = false;
                    }
                    Err(e) => warn!("Player: {}", e),
                },
                Ok(None) => {
                    info!("Player: stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    error!("Player: cannot read stdin: {}", e);
                    stdin_open = false;
                }
            },
            _ = status.tick() => {
                let Some(current) = session.as_ref() else {
                    if !stdin_open {
                        break;
                    }
                    continue;
                };
                if current.is_finished() {
                    if !eof_reported {
                        info!("Player: eof at {:.3}s", current.engine().position());
                        eof_reported = true;
                    }
                    if !stdin_open {
                        break;
                    }
                } else if !current.engine().is_paused() {
                    info!("Player: position {:.3}s", current.engine().position());
                }
            }
        }
    }

    if let Some(mut session) = session {
        tokio::task::spawn_blocking(move || session.unload()).await??;
    }
    Ok(())
}

async fn unload(session: &mut Option<Session>) {
    let Some(mut current) = session.take() else {
        warn!("Player: no media loaded");
        return;
    };
    match tokio::task::spawn_blocking(move || current.unload()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Player: {}", e),
        Err(e) => error!("Player: unload task failed: {}", e),
    }
}

/// Apply a command that needs no blocking work, or tell the loop what to do
fn handle(command: Command, session: &mut Option<Session>) -> Flow {
    match command {
        Command::Quit => return Flow::Quit,
        Command::Unload => return Flow::Unload,
        _ => {}
    }
    let Some(current) = session.as_mut() else {
        warn!("Player: no media loaded");
        return Flow::Continue;
    };

    let result = match command {
        Command::Play => current.play(),
        Command::Pause => current.pause(),
        Command::Seek(target) => match target.to_seconds(current.duration()) {
            Some(seconds) => {
                info!("Player: seek to {:.3}s", seconds);
                current.seek(seconds)
            }
            None => {
                warn!("Player: duration unknown, seek by seconds instead (e.g. \"seek 30s\")");
                Ok(())
            }
        },
        Command::Volume(slider) => {
            let gain = current.engine().set_volume(slider);
            info!("Player: volume {} (gain {:.3})", slider, gain);
            Ok(())
        }
        Command::Mute(mute) => {
            current.engine().set_mute(mute);
            info!("Player: mute {}", mute);
            Ok(())
        }
        Command::QuickPreview(enabled) => {
            current.engine().set_quick_preview(enabled);
            info!("Player: quick preview {}", enabled);
            Ok(())
        }
        Command::Info => {
            current.log_info();
            Ok(())
        }
        Command::Unload | Command::Quit => Ok(()),
    };

    if let Err(e) = result {
        error!("Player: {}", e);
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unload_and_quit_leave_the_loop_to_act() {
        let mut session = None;
        assert_eq!(handle(Command::Unload, &mut session), Flow::Unload);
        assert_eq!(handle(Command::Quit, &mut session), Flow::Quit);
    }

    #[test]
    fn test_commands_without_media_continue() {
        let mut session = None;
        for command in [Command::Play, Command::Info, Command::Volume(0.5)] {
            assert_eq!(handle(command, &mut session), Flow::Continue);
        }
    }

    #[tokio::test]
    async fn test_unload_without_media_is_a_noop() {
        let mut session = None;
        unload(&mut session).await;
        assert!(session.is_none());
    }
}
