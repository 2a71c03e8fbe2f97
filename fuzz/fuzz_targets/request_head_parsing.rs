#![no_main]

use headwire_h1::{pseudo, BufferedSource, Connection, Role, Version};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut conn = Connection::new(Role::Server, Version::Http11);
    let mut src = BufferedSource::new(data);
    let Ok(headers) = conn.new_stream().read_request_headers(&mut src) else {
        return;
    };

    // The writer's preconditions allow exactly one :authority; a parsed head
    // can carry zero (no Host) or several (CONNECT target plus Host lines).
    if !matches!(headers.get_only(pseudo::AUTHORITY), Ok(Some(_))) {
        return;
    }

    // A head that parsed must survive re-serialization and re-parse.
    let mut client = Connection::new(Role::Client, Version::Http11);
    let mut wire = Vec::new();
    client
        .new_stream()
        .write_header_block(&headers, &mut wire)
        .expect("serializing a parsed head cannot fail");

    let mut server = Connection::new(Role::Server, Version::Http11);
    let mut reparse = BufferedSource::new(&wire[..]);
    server
        .new_stream()
        .read_request_headers(&mut reparse)
        .expect("a serialized head must re-parse");
});
