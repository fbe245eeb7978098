extern crate fast_buffer;

use fast_buffer::prelude::*;
use std::io::{self, Read};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let alloc = Allocator::with_config(AllocatorConfig::new().debug(DebugFlags::ALL))
        .expect("default bounds are valid");

    // mirror tracing events to stdout as well
    alloc.init_logger(FnLogger::new(
        |line: &str| println!("[fast_buffer] {}", line),
        |args: std::fmt::Arguments<'_>| print!("[fast_buffer] {}", args),
    ));

    let mut buffer = alloc.acquire(3);
    let filled = buffer.read_from(&mut io::repeat(0b101).take(3)).unwrap();

    println!("Filled {} bytes, slice content: {:?}", filled, buffer.unread());
    assert_eq!(buffer.unread(), [0b101, 0b101, 0b101]);

    let mut out = Vec::new();
    buffer.write_to(&mut out).unwrap();
    println!("Drained: {:?}, buffer empty: {}", out, buffer.is_empty());

    alloc.release(buffer);
    println!("Outstanding: {:?}", alloc.check());
}
