use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vimlink::testing::FakeHost;
use vimlink::{
    Api, Buffer, Mode, ObjectKind, Plugin, RenderState, SplitModifier, View, ViewRenderer,
};

#[derive(Default)]
struct Counter {
    count: Arc<AtomicUsize>,
    renderer: Arc<Mutex<Option<ViewRenderer>>>,
}

impl View for Counter {
    fn file_type(&self) -> String {
        "counter".to_string()
    }

    fn lines(&self) -> Vec<String> {
        vec![format!("count: {}", self.count.load(Ordering::SeqCst))]
    }

    fn attach(&self, renderer: ViewRenderer) {
        *self.renderer.lock() = Some(renderer);
    }

    fn initialize(&self, buffer: &Arc<Buffer>, _api: &Api) {
        let count = self.count.clone();
        let renderer = self.renderer.clone();
        let handler = buffer
            .keymaps()
            .set_func(Mode::Normal, "+", move || {
                count.fetch_add(1, Ordering::SeqCst);
                if let Some(renderer) = renderer.lock().clone() {
                    renderer.render();
                }
            })
            .expect("map +");
        buffer.attach(handler);
    }
}

fn call_in(rhs: &str) -> &str {
    let start = rhs.find("call ").map(|i| i + 5).unwrap_or(0);
    let end = rhs.rfind("<CR>").unwrap_or(rhs.len());
    &rhs[start..end]
}

#[test]
fn view_in_a_split_follows_key_presses() {
    let host = FakeHost::new();
    let api = host.api();

    let buffer = api
        .create_split_buffer(30, &[SplitModifier::Vertical, SplitModifier::TopLeft])
        .unwrap();
    assert!(host.commands().contains(&"vertical topleft 30new".to_string()));
    assert!(buffer.is_current());

    let renderer = api
        .renderer()
        .attach(&buffer, Arc::new(Counter::default()))
        .unwrap();
    assert_eq!(buffer.lines().unwrap(), vec!["count: 0"]);

    let plus = host.keymap("n", "+").unwrap();
    assert_eq!(plus.buffer, Some(buffer.id()));
    host.run_call(call_in(&plus.rhs)).unwrap();
    host.run_call(call_in(&plus.rhs)).unwrap();

    assert_eq!(buffer.lines().unwrap(), vec!["count: 2"]);
    assert_eq!(renderer.state(), RenderState::Rendered);
}

#[test]
fn closing_a_view_buffer_releases_everything() {
    let host = FakeHost::new();
    let api = host.api();
    let handlers_before = api.handlers().len();

    let buffer = api.create_split_buffer(10, &[]).unwrap();
    let id = buffer.id();
    let renderer = api
        .renderer()
        .attach(&buffer, Arc::new(Counter::default()))
        .unwrap();
    assert_eq!(api.handlers().len(), handlers_before + 1);

    buffer.close().unwrap();
    assert_eq!(renderer.state(), RenderState::Disposed);
    assert_eq!(api.handlers().len(), handlers_before);

    // The wrapper stays cached until the host reports the wipe.
    assert!(api.registry().ids(ObjectKind::Buffer).contains(&id));
    host.fire("BufWipeout", Some(id));
    assert!(!api.registry().ids(ObjectKind::Buffer).contains(&id));
    assert!(api.buffer_by_id(id).is_none());
}

#[test]
fn wrappers_keep_their_identity() {
    let host = FakeHost::new();
    let api = host.api();
    let id = host.add_buffer(&["a"]);
    let window = host.open_window(id);

    let by_id = api.buffer_by_id(id).unwrap();
    let through_window = api.window_by_id(window).unwrap().buffer().unwrap();
    let found = api.find_buffer(|b| b.id() == id).unwrap();

    assert!(Arc::ptr_eq(&by_id, &through_window));
    assert!(Arc::ptr_eq(&by_id, &found));
}

struct Case;

impl Plugin for Case {
    fn activate(&self, api: &Api) {
        let keymaps = api.global().keymaps();
        keymaps
            .set_text_action("cu", |text| text.to_uppercase())
            .expect("map cu");
    }
}

#[test]
fn plugin_activation_installs_text_actions() {
    let host = FakeHost::new();
    let api = host.api();

    vimlink::start(&api, Arc::new(Case)).unwrap().join().unwrap();

    host.set_motion_text("shout");
    let visual = host.keymap("x", "cu").unwrap();
    host.run_call(call_in(&visual.rhs)).unwrap();
    assert_eq!(host.pasted(), vec!["SHOUT"]);

    api.shutdown();
    assert!(api.handlers().is_empty());
}
