use rtlink_frame::CommandSelector;
use rtlink_peer::{CommandChannel, LinkConfig};
use rtlink_transport::DeviceStream;
use tracing::warn;

use crate::cmd::{LinkArgs, SendArgs};
use crate::exit::{peer_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_dispatch, OutputFormat};

pub fn run(args: SendArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    check_param_args(&args)?;
    let config = link.load_config()?;
    let channel = open_channel(link, &config)?;

    let dispatch = channel
        .send(args.selector, args.param_id, args.value)
        .map_err(|err| peer_error("send failed", err))?;
    print_dispatch(args.selector, dispatch, format);

    Ok(SUCCESS)
}

fn open_channel(link: &LinkArgs, config: &LinkConfig) -> CliResult<CommandChannel<DeviceStream>> {
    let stream =
        DeviceStream::open(&link.device).map_err(|err| transport_error("open failed", err))?;
    if config.raw_mode {
        if let Err(err) = stream.configure_raw() {
            warn!(device = %link.device.display(), error = %err, "raw mode not applied");
        }
    }
    Ok(CommandChannel::new(stream, config.pacing_delay))
}

/// Parameter flags only mean something for set-param.
fn check_param_args(args: &SendArgs) -> CliResult<()> {
    let has_params = args.param_id != 0 || args.value != 0.0;
    if has_params && args.selector != CommandSelector::SetParam {
        return Err(CliError::new(
            USAGE,
            format!("--param-id/--value only apply to set-param, not {}", args.selector),
        ));
    }
    Ok(())
}
