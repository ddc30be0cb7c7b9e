//! Loopback example: runs the link engine against a simulated coprocessor.
//!
//! The simulated side decodes host commands and, while excitation is on,
//! streams a sine reference and a decaying error signal.
//!
//! Run with:
//!   cargo run --example loopback --features peer

use std::io::{ErrorKind, Write};
use std::thread;
use std::time::Duration;

use rtlink::frame::wire::{CMD_START_EXCITATION, CMD_STOP_EXCITATION};
use rtlink::frame::{CommandSelector, MessageKind, Packet, PacketDecoder, SampleArray, ARRAY_LEN};
use rtlink::peer::{Dispatch, Link, LinkConfig, SignalKind};
use rtlink::transport::{DeviceStream, Readiness, WaitReadable};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (host, device) = DeviceStream::pair()?;
    let coprocessor = thread::spawn(move || simulate(device));

    let config = LinkConfig::default().with_pacing_delay(Duration::from_millis(20));
    let link = Link::from_stream(host, config)?;

    link.send(CommandSelector::SetParam, 2, 50.0)?;
    link.send(CommandSelector::StartExcitation, 0, 0.0)?;

    for _ in 0..5 {
        for kind in SignalKind::ALL {
            if let Some(array) = link.signal(kind).consume_timeout(Duration::from_secs(1)) {
                eprintln!(
                    "[host] {} #{} min={:.3}V max={:.3}V first={:?}",
                    array.kind,
                    array.sequence,
                    array.range.min,
                    array.range.max,
                    &array.scaled[..4]
                );
            }
        }
    }

    link.send(CommandSelector::StopExcitation, 0, 0.0)?;
    let dispatch = link.send_command(0, 0, 0.0)?;
    assert_eq!(dispatch, Dispatch::Terminated);
    eprintln!("[host] receiver exit: {:?}", link.shutdown()?);

    if let Err(err) = coprocessor.join().map_err(|_| "coprocessor panicked")? {
        eprintln!("[coprocessor] stopped: {err}");
    }
    Ok(())
}

fn simulate(mut device: DeviceStream) -> std::io::Result<()> {
    let mut decoder = PacketDecoder::accepting(&[MessageKind::Command, MessageKind::SetParam]);
    let mut exciting = false;
    let mut frequency = 1.0;
    let mut tick = 0u32;

    loop {
        let wait = if exciting { Duration::from_millis(5) } else { Duration::from_millis(200) };
        let ready = device
            .wait_readable(Some(wait))
            .map_err(std::io::Error::other)?;
        if ready == Readiness::Readable {
            match decoder.read_from(&mut device) {
                Ok(0) => return Ok(()),
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::WouldBlock => {}
                Err(err) => return Err(err),
            }
        }

        while let Some(packet) = decoder.decode_next() {
            eprintln!("[coprocessor] received {packet:?}");
            match packet {
                Packet::Command(CMD_START_EXCITATION) => exciting = true,
                Packet::Command(CMD_STOP_EXCITATION) => exciting = false,
                Packet::SetParam { param_id: 2, param_value } => frequency = param_value,
                _ => {}
            }
        }

        if exciting {
            tick += 1;
            let (reference, error) = waveforms(tick, frequency);
            device.write_all(&Packet::RefArray(reference).to_bytes())?;
            device.write_all(&Packet::ErrArray(error).to_bytes())?;
        }
    }
}

fn waveforms(tick: u32, frequency: f64) -> (Box<SampleArray>, Box<SampleArray>) {
    let mut reference = Box::new([0i16; ARRAY_LEN]);
    let mut error = Box::new([0i16; ARRAY_LEN]);
    let decay = (-f64::from(tick) / 10.0).exp();
    for (i, (r, e)) in reference.iter_mut().zip(error.iter_mut()).enumerate() {
        let phase = 2.0 * std::f64::consts::PI * frequency * i as f64 / 1000.0;
        *r = (phase.sin() * 16000.0) as i16;
        *e = (phase.cos() * 8000.0 * decay) as i16;
    }
    (reference, error)
}
