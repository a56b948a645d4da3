use std::fs::File;
use std::io::{BufReader, Read};

use castr_ogg::{summarize, PageReader};
use castr_session::tracks::SUB_TRACK_FLAG;

use crate::cmd::InspectArgs;
use crate::exit::{ogg_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_inspect, InspectOutput, OutputFormat, StreamOutput};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let mut source: Box<dyn Read> = Box::new(std::io::empty());
    for path in &args.files {
        let file = File::open(path)
            .map_err(|err| CliError::new(FAILURE, format!("{}: {err}", path.display())))?;
        source = Box::new(source.chain(BufReader::new(file)));
    }

    let streams = summarize(PageReader::new(source)).map_err(|err| ogg_error("read failed", err))?;
    let contiguous = streams.iter().all(|stream| stream.is_contiguous());
    let out = InspectOutput {
        files: args
            .files
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
        streams: streams
            .into_iter()
            .map(|stream| StreamOutput {
                serial: stream.serial,
                sub_track: stream.serial & SUB_TRACK_FLAG != 0,
                pages: stream.pages,
                packets: stream.packets,
                bytes: stream.bytes,
                first_sequence: stream.first_sequence,
                last_sequence: stream.last_sequence,
                sequence_gaps: stream.sequence_gaps,
                begins: stream.begins,
                last_granule: stream.last_granule,
                truncated: stream.truncated,
            })
            .collect(),
        contiguous,
    };

    print_inspect(&out, format);
    if !contiguous {
        tracing::warn!("sequence gaps found");
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}
