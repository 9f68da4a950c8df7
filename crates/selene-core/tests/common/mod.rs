//! Shared helpers for integration tests
#![allow(dead_code)]

use selene_bytecode::{Opcode, Proto, ProtoBuilder};
use selene_core::{LifecycleState, Thread};
use std::time::{Duration, Instant};

/// `function(x) return x + 1 end`
pub fn add_one() -> Proto {
    let mut b = ProtoBuilder::with_params("add_one", 1);
    b.get_local(0).number(1.0).emit(Opcode::Add).ret(1);
    b.build().unwrap()
}

/// `function() return <text> end`
pub fn returns_string(text: &str) -> Proto {
    let mut b = ProtoBuilder::new("constant");
    b.string(text).ret(1);
    b.build().unwrap()
}

/// `function() return false end`
pub fn returns_false() -> Proto {
    let mut b = ProtoBuilder::new("refuse");
    b.boolean(false).ret(1);
    b.build().unwrap()
}

/// `function() error(<message>) end`
pub fn raises(message: &str) -> Proto {
    let mut b = ProtoBuilder::new("raise");
    b.get_global("error").string(message).call(1, 0);
    b.build().unwrap()
}

/// `function() return <name> end`
pub fn reads_global(name: &str) -> Proto {
    let mut b = ProtoBuilder::new("read");
    b.get_global(name).ret(1);
    b.build().unwrap()
}

/// `function(v) <name> = v end`
pub fn stores_global(name: &str) -> Proto {
    let mut b = ProtoBuilder::with_params("store", 1);
    b.get_local(0).set_global(name);
    b.build().unwrap()
}

/// `function() event.on(<event>, function(v) <global> = v end) return true end`
pub fn listens(event: &str, global: &str) -> Proto {
    let mut b = ProtoBuilder::new("listen");
    b.get_global("event").get_field("on").string(event);
    b.closure(stores_global(global)).call(2, 0);
    b.boolean(true).ret(1);
    b.build().unwrap()
}

/// `function() event.on(<event>, function(v) <global> = v end) return false end`
pub fn listens_then_refuses(event: &str, global: &str) -> Proto {
    let mut b = ProtoBuilder::new("listen_refuse");
    b.get_global("event").get_field("on").string(event);
    b.closure(stores_global(global)).call(2, 0);
    b.boolean(false).ret(1);
    b.build().unwrap()
}

/// Poll `thread` until it reaches `state`
pub fn wait_for_state(thread: &Thread, state: LifecycleState) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if thread.status() == state {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}
