#![no_main]

use headwire_h1::{BufferedSource, Connection, Role, Version};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut conn = Connection::new(Role::Client, Version::Http11);
    let mut src = BufferedSource::new(data);
    let _ = conn.new_stream().read_response_headers(&mut src);

    let mut pinned = Connection::new(Role::Client, Version::Http10);
    let mut src = BufferedSource::new(data);
    let _ = pinned.new_stream().read_response_headers(&mut src);
});
