mod support;

mod inline;
mod resolve;

use std::{sync::Arc, thread};

use crate::{BuildOptions, Bundler, BundlerGeneric};

#[test]
fn threaded_environment() {
    let bundler = Arc::new(Bundler::new());
    for _ in 0..2 {
        _ = thread::spawn({
            let bundler = Arc::clone(&bundler);
            move || {
                let parser = support::FakeParser::new(&[]);
                _ = bundler.build(BuildOptions::default(), &parser);
            }
        })
        .join();
    }
}

#[test]
fn cancellation_produces_no_chunks() {
    let fs = memory_fs::MemoryFS::new(&[("/app/entry.js", "")]);
    let bundler = BundlerGeneric::new_with_file_system(fs);
    let parser = support::FakeParser::new(&[]);
    let token = crate::CancellationToken::new();
    token.cancel();
    let output = bundler.build_cancellable(
        support::entry_options(&["/app/entry.js"]),
        &parser,
        &token,
    );
    assert!(output.link.chunks.is_empty());
}
