use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rtlink_frame::CommandSelector;
use rtlink_peer::{Link, ReceiveExit};
use tracing::info;

use crate::cmd::{LinkArgs, MonitorArgs};
use crate::exit::{peer_error, CliError, CliResult, SUCCESS};
use crate::output::{print_array, OutputFormat};

/// Per-signal wait before checking for Ctrl-C again.
const CONSUME_WAIT: Duration = Duration::from_millis(50);

pub fn run(args: MonitorArgs, link_args: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let config = link_args.load_config()?;
    let link = Link::open(&link_args.device, config).map_err(|err| peer_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    if args.start {
        link.send(CommandSelector::StartExcitation, 0, 0.0)
            .map_err(|err| peer_error("start failed", err))?;
    }

    let mut printed = 0usize;
    let kinds = args.signal.kinds();
    // Arrays published just before the peer closed are still drained.
    'outer: while running.load(Ordering::SeqCst)
        && (link.is_receiving() || kinds.iter().any(|kind| link.signal(*kind).is_ready()))
    {
        for kind in kinds {
            if let Some(array) = link.signal(*kind).consume_timeout(CONSUME_WAIT) {
                print_array(&array, format);
                printed = printed.saturating_add(1);

                if args.count.is_some_and(|count| printed >= count) {
                    break 'outer;
                }
            }
        }
    }

    if args.start {
        link.send(CommandSelector::StopExcitation, 0, 0.0)
            .map_err(|err| peer_error("stop failed", err))?;
    }

    match link.shutdown().map_err(|err| peer_error("receive failed", err))? {
        ReceiveExit::PeerClosed => info!(printed, "coprocessor closed the link"),
        ReceiveExit::Shutdown => info!(printed, "monitor stopped"),
    }
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
