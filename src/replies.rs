//! Text the bot posts back into chat rooms.

pub const UNKNOWN_COMMAND: &str = "Please type in an option";
pub const MISSING_FILE: &str = "Missing file or improper file type, try again";

pub const SERIAL_NO_ADDRESS: &str = "Please specify an address";

pub const UPLOAD_WRONG_TYPE: &str = "Only zip files allowed";

pub const CONFIG_WRONG_TYPE: &str = "Only .yml files supported";
pub const CONFIG_RECEIVED: &str = "Attachment received, will start configuring devices shortly";
pub const CONFIG_CHECKING: &str = "Checking existing devices first, please stand by";
pub const CONFIG_PRELIM_DONE: &str = "Preliminary checks completed, configuring devices now";
pub const CONFIG_NO_MATCHES: &str = "No discovered devices matched the inventory";
pub const CONFIG_ALL_OK: &str = "All devices were successfully configured";
pub const CONFIG_ARCHIVE: &str = "Running configs attached";
pub const CONFIG_NO_ARCHIVE: &str = "No configs to return";
pub const CONFIG_NO_WORKSPACE: &str = "Unable to prepare a workspace for running configs";

pub fn serial_checking(address: &str) -> String {
    format!("Checking serial number of {}", address)
}

pub fn serial_result(address: &str, serial: &str) -> String {
    format!("Serial number of {} is {}", address, serial)
}

pub fn serial_failed(address: &str) -> String {
    format!("Could not read serial number of {}", address)
}

pub fn upload_done(dir: &str) -> String {
    format!("Files can be found at {}", dir)
}

pub fn inventory_invalid(reason: &str) -> String {
    format!("Inventory file rejected: {}", reason)
}

pub fn core_unreachable(core: &str) -> String {
    format!("Unable to read devices from core switch {}", core)
}

pub fn detected<'a>(addresses: impl IntoIterator<Item = &'a String>) -> String {
    listing("Following devices detected:", addresses.into_iter().map(String::as_str))
}

pub fn serial_mappings<'a, S: std::fmt::Display + 'a>(
    serials: impl IntoIterator<Item = (&'a String, &'a S)>,
) -> String {
    let lines: Vec<String> = serials
        .into_iter()
        .map(|(address, serial)| format!("{}: {}", address, serial))
        .collect();
    listing("Serial number mappings:", lines.iter().map(String::as_str))
}

pub fn ambiguous<'a>(serials: impl IntoIterator<Item = (&'a String, &'a Vec<String>)>) -> String {
    let lines: Vec<String> = serials
        .into_iter()
        .map(|(serial, addresses)| format!("{}: {}", serial, addresses.join(", ")))
        .collect();
    listing(
        "Ambiguous serials (same serial on several devices, skipped):",
        lines.iter().map(String::as_str),
    )
}

pub fn failed<'a>(hostnames: impl IntoIterator<Item = &'a String>) -> String {
    listing(
        "Following devices failed (check config file exists on server, config is good, and that device is reachable):",
        hostnames.into_iter().map(String::as_str),
    )
}

pub fn partially_applied<'a>(hostnames: impl IntoIterator<Item = &'a String>) -> String {
    listing(
        "Renamed but not fully configured:",
        hostnames.into_iter().map(String::as_str),
    )
}

fn listing<'a>(heading: &str, lines: impl Iterator<Item = &'a str>) -> String {
    let mut text = heading.to_string();
    for line in lines {
        text.push('\n');
        text.push_str(line);
    }
    text
}
