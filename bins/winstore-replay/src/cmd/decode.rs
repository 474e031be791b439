use winstore_engine::key_schema;

use crate::config::DecodeArgs;
use crate::error::ReplayError;
use crate::output;

pub fn run(args: DecodeArgs) -> Result<(), ReplayError> {
    let binary = output::decode(&args.key)?;
    let decoded = key_schema::decode(&binary)?;
    let mut line = output::store_key(&decoded);
    if let Some(size) = args.window_size_ms {
        let windowed = key_schema::from_store_key(&binary, size)?;
        line["window_end"] = windowed.window.end.into();
    }
    println!("{line}");
    Ok(())
}
