use std::sync::Arc;
use std::time::Duration;

use hostlink_core::Handle;
use hostlink_http::executor::mock::MockExecutor;
use hostlink_http::{AsyncState, HttpResponse};
use hostlink_kv::MemoryKv;
use hostlink_runtime::{
    BridgeConfig, BridgeContext, BridgeError, FrameConfig, GuestInstance, GuestModule, RunOutcome,
};

const WAIT: Duration = Duration::from_secs(5);

fn instance(wat: &str, config: &BridgeConfig, executor: MockExecutor) -> GuestInstance {
    let context =
        BridgeContext::new(config, Box::new(MemoryKv::new()), Arc::new(executor)).unwrap();
    GuestModule::new(wat)
        .unwrap()
        .instantiate(context)
        .unwrap()
}

fn u32_at(memory: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(memory[offset..offset + 4].try_into().unwrap())
}

fn u16_at(memory: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(memory[offset..offset + 2].try_into().unwrap())
}

/// Issues one GET from `_start`; `poll` and `clear` drive it afterwards.
///
/// Memory: index at 100, response/size/status slots at 104/108/112, the
/// callback's status at 56, the state the callback sees when it polls its own
/// request at 52, the free counter at 60, heap from 4096. `again` re-issues
/// into the same index.
const HTTP_GUEST: &str = r#"
    (module
      (import "env" "web_set_mem_funcs" (func $mem_funcs (param i32 i32)))
      (import "env" "MTY_HttpAsyncRequest"
        (func $request (param i32 i32 i32 i32 i32 i32 i32 i32 i32 i32)))
      (import "env" "MTY_HttpAsyncPoll" (func $poll (param i32 i32 i32 i32) (result i32)))
      (import "env" "MTY_HttpAsyncClear" (func $clear (param i32)))
      (memory (export "memory") 1)
      (table (export "__indirect_function_table") 4 funcref)
      (elem (i32.const 1) $alloc $free $on_response)
      (global $heap (mut i32) (i32.const 4096))
      (func $alloc (param $size i32) (param $count i32) (result i32)
        (local $ptr i32)
        (local.set $ptr (global.get $heap))
        (global.set $heap
          (i32.add (global.get $heap) (i32.mul (local.get $size) (local.get $count))))
        (local.get $ptr))
      (func $free (param $ptr i32)
        (i32.store (i32.const 60) (i32.add (i32.load (i32.const 60)) (i32.const 1))))
      (func $on_response (param $status i32) (param $response i32) (param $size i32)
        (i32.store (i32.const 56) (local.get $status))
        (i32.store (i32.const 52)
          (call $poll (i32.load (i32.const 100)) (i32.const 104) (i32.const 108) (i32.const 112))))
      (func $issue
        (call $request (i32.const 100) (i32.const 200) (i32.const 0) (i32.const 220)
          (i32.const 230) (i32.const 260) (i32.const 0) (i32.const 0) (i32.const 0)
          (i32.const 3)))
      (func (export "_start")
        (i32.store (i32.const 52) (i32.const 99))
        (call $mem_funcs (i32.const 1) (i32.const 2))
        (call $issue))
      (func (export "again")
        (call $issue))
      (func (export "poll") (result i32)
        (call $poll (i32.load (i32.const 100)) (i32.const 104) (i32.const 108) (i32.const 112)))
      (func (export "clear")
        (call $clear (i32.const 100)))
      (data (i32.const 200) "api.test\00")
      (data (i32.const 220) "GET\00")
      (data (i32.const 230) "/v1/ping\00")
      (data (i32.const 260) "Accept: text/plain\00"))
"#;

fn wait_for_request(guest: &GuestInstance) {
    let handle = Handle::from_raw(u32_at(guest.memory(), 100)).unwrap();
    let request = guest.context().requests().get(handle).unwrap();
    assert!(request.wait_resolved(WAIT));
}

#[test]
fn test_http_request_end_to_end() {
    let executor = MockExecutor::new()
        .with_response("http://api.test/v1/ping", HttpResponse::new(200, "pong"));
    let mut guest = instance(HTTP_GUEST, &BridgeConfig::default(), executor.clone());

    assert_eq!(guest.run().unwrap(), RunOutcome::Returned);
    assert!(guest.context().has_allocator());
    wait_for_request(&guest);

    let state: u32 = guest.call("poll", ()).unwrap();
    assert_eq!(state, AsyncState::Ok.code());

    let memory = guest.memory();
    assert_eq!(u16_at(memory, 112), 200);
    assert_eq!(u32_at(memory, 108), 4);
    assert_eq!(u32_at(memory, 104), 4096);
    assert_eq!(&memory[4096..4101], b"pong\0");
    assert_eq!(u32_at(memory, 56), 200);
    assert_eq!(u32_at(memory, 52), AsyncState::Done.code());

    let state: u32 = guest.call("poll", ()).unwrap();
    assert_eq!(state, AsyncState::Done.code());

    guest.call::<(), ()>("clear", ()).unwrap();
    assert_eq!(u32_at(guest.memory(), 100), 0);
    assert_eq!(u32_at(guest.memory(), 60), 1);
    assert!(guest.context().requests().is_empty());

    let recorded = executor.recorded_requests();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].method, "GET");
    assert_eq!(
        recorded[0].headers,
        vec![("Accept".to_string(), "text/plain".to_string())]
    );
}

#[test]
fn test_http_reissue_releases_previous_request() {
    let executor = MockExecutor::new()
        .with_response("http://api.test/v1/ping", HttpResponse::new(200, "pong"));
    let mut guest = instance(HTTP_GUEST, &BridgeConfig::default(), executor.clone());
    guest.run().unwrap();
    wait_for_request(&guest);

    let state: u32 = guest.call("poll", ()).unwrap();
    assert_eq!(state, AsyncState::Ok.code());
    let first = u32_at(guest.memory(), 100);
    assert_eq!(u32_at(guest.memory(), 60), 0);

    guest.call::<(), ()>("again", ()).unwrap();

    let second = u32_at(guest.memory(), 100);
    assert_ne!(second, 0);
    assert_ne!(second, first);
    assert_eq!(u32_at(guest.memory(), 60), 1);
    assert_eq!(guest.context().requests().len(), 1);
    assert!(guest
        .context()
        .requests()
        .get(Handle::from_raw(first).unwrap())
        .is_none());

    wait_for_request(&guest);
    assert_eq!(executor.recorded_requests().len(), 2);
}

#[test]
fn test_http_poll_continues_until_resolved() {
    let executor = MockExecutor::new()
        .with_default_response(HttpResponse::new(204, ""))
        .gated();
    let mut guest = instance(HTTP_GUEST, &BridgeConfig::default(), executor.clone());
    guest.run().unwrap();

    let state: u32 = guest.call("poll", ()).unwrap();
    assert_eq!(state, AsyncState::Continue.code());
    assert_eq!(u16_at(guest.memory(), 112), 0);
    assert_eq!(u32_at(guest.memory(), 104), 0);

    executor.open_gate();
    wait_for_request(&guest);

    let state: u32 = guest.call("poll", ()).unwrap();
    assert_eq!(state, AsyncState::Ok.code());
    assert_eq!(u16_at(guest.memory(), 112), 204);
}

#[test]
fn test_http_failure_polls_error() {
    let executor = MockExecutor::new().fail_with("connection reset");
    let mut guest = instance(HTTP_GUEST, &BridgeConfig::default(), executor);
    guest.run().unwrap();
    wait_for_request(&guest);

    let state: u32 = guest.call("poll", ()).unwrap();
    assert_eq!(state, AsyncState::Error.code());
    assert_eq!(u16_at(guest.memory(), 112), 0);
    assert_eq!(u32_at(guest.memory(), 56), 0);

    guest.call::<(), ()>("clear", ()).unwrap();
    assert_eq!(u32_at(guest.memory(), 60), 0);
}

#[test]
fn test_parse_url_and_hostname() {
    let wat = r#"
        (module
          (import "env" "MTY_HttpParseUrl" (func $parse (param i32 i32 i32 i32 i32) (result i32)))
          (import "env" "gethostname" (func $hostname (param i32 i32) (result i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (i32.store (i32.const 0)
              (call $parse (i32.const 100) (i32.const 200) (i32.const 64) (i32.const 300) (i32.const 64)))
            (i32.store (i32.const 4)
              (call $parse (i32.const 150) (i32.const 400) (i32.const 64) (i32.const 500) (i32.const 64)))
            (drop (call $hostname (i32.const 600) (i32.const 6))))
          (data (i32.const 100) "https://example.com:8443/a/b?x=1\00")
          (data (i32.const 150) "not a url\00"))
    "#;
    let config = BridgeConfig {
        hostname: "arcade.local".to_string(),
        ..BridgeConfig::default()
    };
    let mut guest = instance(wat, &config, MockExecutor::new());
    guest.run().unwrap();

    let memory = guest.memory();
    assert_eq!(u32_at(memory, 0), 1);
    assert_eq!(&memory[200..217], b"example.com:8443\0");
    assert_eq!(&memory[300..309], b"/a/b?x=1\0");
    assert_eq!(u32_at(memory, 4), 0);
    assert_eq!(&memory[600..606], b"arcad\0");
}

const FRAME_GUEST: &str = r#"
    (module
      (import "env" "web_raf" (func $raf (param i32 i32 i32 i32)))
      (memory (export "memory") 1)
      (table (export "__indirect_function_table") 2 funcref)
      (elem (i32.const 1) $step)
      (global $count (mut i32) (i32.const 0))
      (func $step (param $opaque i32) (result i32)
        (global.set $count (i32.add (global.get $count) (i32.const 1)))
        (i32.store (local.get $opaque) (global.get $count))
        (i32.lt_u (global.get $count) (i32.const 5)))
      (func (export "_start")
        (call $raf (i32.const 0) (i32.const 1) (i32.const 0) (i32.const 64))
        unreachable))
"#;

fn frame_config(max_frames: Option<u64>) -> BridgeConfig {
    BridgeConfig {
        frames: FrameConfig {
            interval_ms: 0,
            max_frames,
        },
        ..BridgeConfig::default()
    }
}

#[test]
fn test_frame_loop_runs_until_guest_stops() {
    let mut guest = instance(FRAME_GUEST, &frame_config(None), MockExecutor::new());

    assert_eq!(guest.run().unwrap(), RunOutcome::FramesEnded { frames: 5 });
    assert_eq!(u32_at(guest.memory(), 64), 5);
    assert!(guest.context().frame_loop().is_some());
}

#[test]
fn test_frame_loop_honours_frame_cap() {
    let mut guest = instance(FRAME_GUEST, &frame_config(Some(2)), MockExecutor::new());

    assert_eq!(guest.run().unwrap(), RunOutcome::FramesEnded { frames: 2 });
    assert_eq!(u32_at(guest.memory(), 64), 2);
}

const GFX_GUEST: &str = r#"
    (module
      (import "env" "glGenTextures" (func $gen (param i32 i32)))
      (import "env" "glDeleteTextures" (func $delete (param i32 i32)))
      (import "env" "glBindTexture" (func $bind (param i32 i32)))
      (import "env" "glCreateProgram" (func $program (result i32)))
      (import "env" "glCreateShader" (func $shader (param i32) (result i32)))
      (import "env" "glAttachShader" (func $attach (param i32 i32)))
      (import "env" "glUseProgram" (func $use (param i32)))
      (memory (export "memory") 1)
      (func (export "_start")
        (local $prog i32)
        (call $gen (i32.const 2) (i32.const 100))
        (call $bind (i32.const 3553) (i32.load (i32.const 100)))
        (call $delete (i32.const 1) (i32.const 100))
        (local.set $prog (call $program))
        (call $attach (local.get $prog) (call $shader (i32.const 35633)))
        (call $use (local.get $prog))
        (call $bind (i32.const 3553) (i32.const 0)))
      (func (export "stale")
        (call $bind (i32.const 3553) (i32.load (i32.const 100)))))
"#;

#[test]
fn test_gl_names_are_tracked() {
    let mut guest = instance(GFX_GUEST, &BridgeConfig::default(), MockExecutor::new());
    assert_eq!(guest.run().unwrap(), RunOutcome::Returned);

    let (first, second) = (u32_at(guest.memory(), 100), u32_at(guest.memory(), 104));
    assert_ne!(first, 0);
    assert_ne!(second, 0);
    assert_ne!(first, second);

    // Second texture, program and shader remain.
    assert_eq!(guest.context().graphics().len(), 3);
}

#[test]
fn test_stale_gl_name_traps() {
    let mut guest = instance(GFX_GUEST, &BridgeConfig::default(), MockExecutor::new());
    guest.run().unwrap();

    let result = guest.call::<(), ()>("stale", ());
    assert!(matches!(result, Err(BridgeError::Wasm { stage: "call", .. })));
}

#[test]
fn test_gen_names_out_of_range_creates_nothing() {
    let wat = r#"
        (module
          (import "env" "glGenBuffers" (func $gen (param i32 i32)))
          (memory (export "memory") 1)
          (func (export "_start")
            (call $gen (i32.const 2) (i32.const 65532))))
    "#;
    let mut guest = instance(wat, &BridgeConfig::default(), MockExecutor::new());

    assert!(matches!(
        guest.run(),
        Err(BridgeError::Wasm { stage: "_start", .. })
    ));
    assert!(guest.context().graphics().is_empty());
}
