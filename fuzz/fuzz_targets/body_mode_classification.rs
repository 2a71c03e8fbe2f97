#![no_main]

use headwire_h1::{
    connection_close, request_body_mode, response_body_mode, BufferedSource, Connection, Role,
    Version,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut conn = Connection::new(Role::Server, Version::Http11);
    let mut src = BufferedSource::new(data);
    let Ok(headers) = conn.new_stream().read_request_headers(&mut src) else {
        return;
    };

    let _ = request_body_mode(&headers);
    let _ = response_body_mode(&headers, b"GET");
    let _ = connection_close(Version::Http10, &headers);
    let _ = connection_close(Version::Http11, &headers);
});
