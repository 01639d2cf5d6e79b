//! Sample guest: decode the `message` field and record its kind

use elastic_wasm_sdk::prelude::*;

export_malloc!();

#[no_mangle]
pub extern "C" fn process() -> i32 {
    match run() {
        Ok(code) => code,
        Err(status) => 10 + status.as_i32(),
    }
}

fn run() -> Result<i32, StatusCode> {
    let started = now_nanos()?;

    let Some(message) = get_field("message")? else {
        log(LogLevel::Warn, "message field is missing")?;
        return Ok(1);
    };

    log(LogLevel::Info, &format!("decoded message: {:?}", message))?;
    put_field("message_kind", &FieldValue::from(message.kind()))?;

    let elapsed = now_nanos()?.saturating_sub(started);
    log(LogLevel::Debug, &format!("processed in {elapsed} ns"))?;
    Ok(0)
}
