
use fake_dom_::{off_screen, on_screen, FakeDom, NodeId};
use lazy_dom::{retry::RetryTimer, Action, Config, Dom, FailedRetention, FetchError, FetchRequest, FetchResponse, LazyLoader, MemoryStorage, Rect, RetryTrigger, Status, Storage};
use std::{cell::RefCell, rc::Rc};

type Loader = LazyLoader<FakeDom, MemoryStorage>;

fn new_loader(dom: &FakeDom, config: Config) -> (Loader, MemoryStorage) {
	let storage = MemoryStorage::new();
	(LazyLoader::new(dom.clone(), storage.clone(), config), storage)
}

fn only_fetch(actions: Vec<Action>) -> FetchRequest {
	let mut fetches: Vec<FetchRequest> = actions
		.into_iter()
		.filter_map(|action| match action {
			Action::Fetch(request) => Some(request),
			_ => None,
		})
		.collect();
	assert_eq!(fetches.len(), 1, "Expected exactly one fetch but got {:?}", fetches);
	fetches.remove(0)
}

fn retry_timer(actions: &[Action]) -> Option<RetryTimer> {
	actions.iter().find_map(|action| match action {
		Action::ArmRetry(timer) => Some(*timer),
		_ => None,
	})
}

fn ok(body: &str) -> Result<FetchResponse, FetchError> {
	Ok(FetchResponse { status: 200, body: body.to_owned() })
}

fn status(status: u16) -> Result<FetchResponse, FetchError> {
	Ok(FetchResponse { status, body: "error page".to_owned() })
}

#[test]
fn scrolled_into_view_loads_once() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], off_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	assert!(loader.start().is_empty());
	assert_eq!(loader.status(&element), Some(Status::Pending));

	dom.set_rect(element, on_screen());
	let request = only_fetch(loader.scroll(1_000));
	assert_eq!(request.url, "/frag");
	assert_eq!(request.method, "GET");
	assert_eq!(request.timeout_ms, 5_000);
	assert_eq!(loader.status(&element), Some(Status::Loading));

	assert!(loader.complete(request.ticket, ok("<p>hi</p>"), 1_100).is_empty());
	assert_eq!(loader.status(&element), Some(Status::Loaded));
	assert_eq!(dom.html(element), "<p>hi</p>");
	assert_eq!(dom.states(element), ["lazy", "lazy-loading", "lazy-loaded"]);
	assert_eq!(dom.events(element), ["lazy-loading", "lazy-loaded"]);
}

#[test]
fn failure_resets_to_lazy_after_the_retry_delay() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	let actions = loader.complete(request.ticket, status(500), 0);
	let timer = retry_timer(&actions).expect("retry timer");
	assert_eq!(timer.delay_ms(), 2_000);
	assert_eq!(loader.status(&element), Some(Status::Failed));
	assert_eq!(loader.failed(), [element]);
	assert_eq!(dom.states(element), ["lazy", "lazy-loading", "lazy-failed"]);
	assert_eq!(dom.events(element), ["lazy-loading", "lazy-failed"]);

	dom.set_rect(element, off_screen());
	assert!(loader.retry_elapsed(timer).is_empty());
	assert_eq!(loader.status(&element), Some(Status::Pending));
	assert!(loader.failed().is_empty());
	assert_eq!(dom.states(element), ["lazy", "lazy-loading", "lazy-failed", "lazy"]);

	dom.set_rect(element, on_screen());
	assert_eq!(only_fetch(loader.scroll(10_000)).url, "/frag");
}

#[test]
fn timeouts_and_network_errors_fail_too() {
	let dom = FakeDom::new();
	let timed_out = dom.lazy("/slow", &[], on_screen());
	let unreachable = dom.lazy("/down", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	let request = only_fetch(loader.complete(request.ticket, Err(FetchError::Timeout { after_ms: 5_000 }), 0));
	loader.complete(request.ticket, Err(FetchError::Network("connection reset".to_owned())), 0);

	assert_eq!(loader.status(&timed_out), Some(Status::Failed));
	assert_eq!(loader.status(&unreachable), Some(Status::Failed));
}

#[test]
fn parent_replace_moves_content_into_the_parent() {
	let dom = FakeDom::new();
	let list = dom.add(dom.body(), &["comments"], &[], on_screen());
	let element = dom.lazy_in(list, "/page-2", &[("data-lazyparent", "")], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("<li>2</li>"), 0);

	assert_eq!(dom.html(list), "<li>2</li>");
	assert!(!dom.is_attached(element));
	assert_eq!(loader.status(&element), None, "the removed placeholder is no longer tracked");
	assert_eq!(dom.events(element), ["lazy-loading"]);
	assert_eq!(dom.events(list), ["lazy-loaded"]);
}

#[test]
fn only_one_load_is_in_flight() {
	let dom = FakeDom::new();
	let a = dom.lazy("/a", &[], on_screen());
	let b = dom.lazy("/b", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let first = only_fetch(loader.start());
	assert_eq!(first.url, "/a");
	assert!(loader.is_loading());
	assert!(loader.scroll(1_000).is_empty());
	assert!(loader.register().is_empty());
	assert_eq!(loader.status(&b), Some(Status::Pending));

	let second = only_fetch(loader.complete(first.ticket, ok("a"), 0));
	assert_eq!(second.url, "/b");
	assert_eq!(loader.status(&a), Some(Status::Loaded));
	assert_eq!(loader.status(&b), Some(Status::Loading));
}

#[test]
fn invisible_elements_are_not_loaded() {
	let dom = FakeDom::new();
	let hidden = dom.lazy("/hidden", &[], on_screen());
	dom.set_hidden(hidden, true);
	let empty = dom.lazy("/empty", &[], Rect::new(100.0, 0.0, 0.0, 0.0));
	let outside = dom.lazy("/outside", &[], off_screen());
	let container = dom.add(dom.body(), &[], &[], on_screen());
	dom.set_hidden(container, true);
	let nested = dom.lazy_in(container, "/nested", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	assert!(loader.start().is_empty());
	for node in [hidden, empty, outside, nested] {
		assert_eq!(loader.status(&node), Some(Status::Pending));
	}
}

#[test]
fn margin_preloads_just_below_the_fold() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], Rect::new(610.0, 0.0, 800.0, 50.0));

	let (mut loader, _) = new_loader(&dom, Config { margin: 0.0, ..Config::default() });
	assert!(loader.start().is_empty());

	let (mut loader, _) = new_loader(&dom, Config::default());
	assert_eq!(only_fetch(loader.start()).url, "/frag");
	assert_eq!(loader.status(&element), Some(Status::Loading));
}

#[test]
fn loaded_is_terminal() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("done"), 0);

	dom.add_class(&element, "lazy");
	assert!(loader.register().is_empty());
	assert_eq!(loader.status(&element), Some(Status::Loaded));
	assert!(loader.pending().is_empty());
}

#[test]
fn stale_completions_are_ignored() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("first"), 0);
	assert!(loader.complete(request.ticket, ok("second"), 0).is_empty());
	assert_eq!(dom.html(element), "first");
	assert_eq!(dom.events(element), ["lazy-loading", "lazy-loaded"]);
}

#[test]
fn cache_short_circuits_repeated_urls() {
	let dom = FakeDom::new();
	let a = dom.lazy("/shared", &[("data-lazycache", "")], on_screen());
	let b = dom.lazy("/shared", &[("data-lazycache", "")], on_screen());
	let (mut loader, storage) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	assert!(loader.complete(request.ticket, ok("<p>shared</p>"), 42).is_empty());

	assert_eq!(loader.status(&a), Some(Status::Loaded));
	assert_eq!(loader.status(&b), Some(Status::Loaded));
	assert_eq!(dom.html(b), "<p>shared</p>");
	assert_eq!(dom.states(b), ["lazy", "lazy-loading", "lazy-loaded"]);
	assert!(storage.get_item("lazy_/shared").unwrap().is_some());
	assert_eq!(loader.cache().get("/shared").unwrap().created, 42);
}

#[test]
fn caching_requires_opt_in_and_enabled_cache() {
	let dom = FakeDom::new();
	dom.lazy("/plain", &[], on_screen());
	let (mut loader, storage) = new_loader(&dom, Config::default());
	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("x"), 0);
	assert!(storage.is_empty());

	let dom = FakeDom::new();
	dom.lazy("/opted-in", &[("data-lazycache", "")], on_screen());
	let (mut loader, storage) = new_loader(&dom, Config { cache_enabled: false, ..Config::default() });
	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("x"), 0);
	assert!(storage.is_empty());
}

#[test]
fn full_storage_still_loads() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[("data-lazycache", "")], on_screen());
	let storage = MemoryStorage::with_quota(8);
	let mut loader = LazyLoader::new(dom.clone(), storage.clone(), Config::default());

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("<p>too big to cache</p>"), 0);
	assert_eq!(loader.status(&element), Some(Status::Loaded));
	assert!(storage.is_empty());
}

#[test]
fn corrupt_cache_entries_fall_back_to_the_network() {
	let dom = FakeDom::new();
	dom.lazy("/frag", &[("data-lazycache", "")], on_screen());
	let (mut loader, storage) = new_loader(&dom, Config::default());
	storage.set_item("lazy_/frag", "{\"time\":").unwrap();

	assert_eq!(only_fetch(loader.start()).url, "/frag");
}

#[test]
fn sweep_expires_cached_fragments() {
	let dom = FakeDom::new();
	dom.lazy("/frag", &[("data-lazycache", "")], on_screen());
	let (mut loader, storage) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("x"), 0);
	assert_eq!(loader.sweep_cache(15 * 60 * 1000), 0);
	assert_eq!(loader.sweep_cache(15 * 60 * 1000 + 1), 1);
	assert!(storage.is_empty());
	assert_eq!(loader.cache().get("/frag"), None);
}

#[test]
fn retry_timer_is_debounced() {
	let dom = FakeDom::new();
	let a = dom.lazy("/a", &[], on_screen());
	let b = dom.lazy("/b", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	let actions = loader.complete(request.ticket, status(404), 0);
	let first = retry_timer(&actions).unwrap();
	let request = only_fetch(actions);
	let actions = loader.complete(request.ticket, Err(FetchError::Network("offline".to_owned())), 500);
	let second = retry_timer(&actions).unwrap();
	assert_eq!(loader.failed(), [a, b]);

	assert!(loader.retry_elapsed(first).is_empty());
	assert_eq!(loader.failed(), [a, b]);

	assert_eq!(only_fetch(loader.retry_elapsed(second)).url, "/a");
	assert!(loader.failed().is_empty());
	assert_eq!(loader.status(&b), Some(Status::Pending));
}

#[test]
fn disabled_retry_leaves_failures_alone() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config { fail_retry: false, ..Config::default() });

	let request = only_fetch(loader.start());
	assert!(loader.complete(request.ticket, status(503), 0).is_empty());
	assert!(loader.register().is_empty());
	assert_eq!(loader.status(&element), Some(Status::Failed));
}

#[test]
fn retry_can_be_armed_by_success_instead() {
	let dom = FakeDom::new();
	let a = dom.lazy("/a", &[], on_screen());
	dom.lazy("/b", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config { retry_trigger: RetryTrigger::OnSuccess, ..Config::default() });

	let request = only_fetch(loader.start());
	let actions = loader.complete(request.ticket, status(500), 0);
	assert_eq!(retry_timer(&actions), None);

	let request = only_fetch(actions);
	let timer = retry_timer(&loader.complete(request.ticket, ok("b"), 0)).expect("success re-arms the retry");
	assert_eq!(only_fetch(loader.retry_elapsed(timer)).url, "/a");
	assert_eq!(loader.status(&a), Some(Status::Loading));
}

#[test]
fn failed_elements_can_be_forgotten_on_discovery() {
	let dom = FakeDom::new();
	let a = dom.lazy("/a", &[], on_screen());
	dom.lazy("/b", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config { failed_retention: FailedRetention::ClearOnDiscover, ..Config::default() });

	let request = only_fetch(loader.start());
	let actions = loader.complete(request.ticket, status(500), 0);
	let timer = retry_timer(&actions).unwrap();
	assert_eq!(loader.failed(), [a]);

	let request = only_fetch(actions);
	loader.complete(request.ticket, ok("b"), 0);
	assert!(loader.failed().is_empty());
	assert_eq!(loader.status(&a), None);

	assert_eq!(only_fetch(loader.retry_elapsed(timer)).url, "/a");
}

#[test]
fn middleware_and_callback_hooks_run_by_name() {
	let dom = FakeDom::new();
	let element = dom.lazy("/md", &[("data-lazymiddleware", "upper"), ("data-lazycallback", "done")], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	loader.register_middleware("upper", |_, content| content.to_uppercase());
	let seen = Rc::new(RefCell::new(Vec::<NodeId>::new()));
	loader.register_callback("done", {
		let seen = Rc::clone(&seen);
		move |node| seen.borrow_mut().push(*node)
	});

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("<p>hi</p>"), 0);
	assert_eq!(dom.html(element), "<P>HI</P>");
	assert_eq!(*seen.borrow(), [element]);
}

#[test]
fn unregistered_hooks_are_skipped() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[("data-lazymiddleware", "missing"), ("data-lazycallback", "alsoMissing")], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("<p>as is</p>"), 0);
	assert_eq!(dom.html(element), "<p>as is</p>");
	assert_eq!(loader.status(&element), Some(Status::Loaded));
}

#[test]
fn callback_receives_the_parent_on_parent_replace() {
	let dom = FakeDom::new();
	let list = dom.add(dom.body(), &[], &[], on_screen());
	dom.lazy_in(list, "/more", &[("data-lazyparent", ""), ("data-lazycallback", "done")], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let seen = Rc::new(RefCell::new(Vec::<NodeId>::new()));
	loader.register_callback("done", {
		let seen = Rc::clone(&seen);
		move |node| seen.borrow_mut().push(*node)
	});

	let request = only_fetch(loader.start());
	loader.complete(request.ticket, ok("<li>more</li>"), 0);
	assert_eq!(*seen.borrow(), [list]);
}

#[test]
fn on_lazy_load_is_delegated_by_selector() {
	let dom = FakeDom::new();
	let section = dom.add(dom.body(), &["comments"], &[], on_screen());
	dom.lazy_in(section, "/comments", &[], on_screen());
	dom.lazy("/other", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let seen = Rc::new(RefCell::new(Vec::<NodeId>::new()));
	loader.on_lazy_load(".comments", {
		let seen = Rc::clone(&seen);
		move |node| seen.borrow_mut().push(*node)
	});

	let request = only_fetch(loader.start());
	assert_eq!(request.url, "/comments");
	let request = only_fetch(loader.complete(request.ticket, ok("c"), 0));
	assert_eq!(*seen.borrow(), [section]);

	loader.complete(request.ticket, ok("o"), 0);
	assert_eq!(*seen.borrow(), [section]);
}

#[test]
fn injected_placeholders_are_discovered() {
	let dom = FakeDom::new();
	dom.lazy("/first", &[("data-lazycallback", "reveal")], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	loader.register_callback("reveal", {
		let dom = dom.clone();
		move |node| {
			dom.lazy_in(*node, "/second", &[], on_screen());
		}
	});

	let request = only_fetch(loader.start());
	assert_eq!(only_fetch(loader.complete(request.ticket, ok("<div class=\"lazy\"></div>"), 0)).url, "/second");
}

#[test]
fn csrf_token_is_forwarded() {
	let dom = FakeDom::new();
	dom.set_meta("X-CSRF-Token", "s3cret");
	dom.lazy("/frag", &[], on_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());

	let request = only_fetch(loader.start());
	assert_eq!(request.headers, [("X-CSRF-Token".to_owned(), "s3cret".to_owned())]);
}

#[test]
fn scroll_bursts_are_throttled() {
	let dom = FakeDom::new();
	let element = dom.lazy("/frag", &[], off_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());
	assert!(loader.start().is_empty());

	assert!(loader.scroll(1_000).is_empty());
	dom.set_rect(element, on_screen());
	assert_eq!(loader.scroll(1_050), [Action::ArmThrottle { after_ms: 150 }]);
	assert!(loader.scroll(1_100).is_empty());
	assert_eq!(loader.status(&element), Some(Status::Pending));

	assert_eq!(only_fetch(loader.throttle_elapsed(1_200)).url, "/frag");
	assert!(loader.throttle_elapsed(1_200).is_empty());
}

#[test]
fn late_trailing_timer_does_not_double_up_a_window() {
	let dom = FakeDom::new();
	let a = dom.lazy("/a", &[], off_screen());
	let b = dom.lazy("/b", &[], off_screen());
	let (mut loader, _) = new_loader(&dom, Config::default());
	assert!(loader.start().is_empty());

	assert!(loader.scroll(0).is_empty());
	assert_eq!(loader.scroll(10), [Action::ArmThrottle { after_ms: 190 }]);

	// The trailing timer is delayed past the window; a fresh scroll runs first.
	dom.set_rect(a, on_screen());
	let request = only_fetch(loader.scroll(210));
	assert_eq!(request.url, "/a");
	assert!(loader.complete(request.ticket, ok("a"), 250).is_empty());

	dom.set_rect(b, on_screen());
	assert!(loader.throttle_elapsed(260).is_empty());
	assert_eq!(loader.status(&b), Some(Status::Pending));

	assert_eq!(only_fetch(loader.scroll(420)).url, "/b");
}

#[test]
fn replaced_placeholders_are_not_retained() {
	let dom = FakeDom::new();
	let list = dom.add(dom.body(), &[], &[], on_screen());
	let placeholders: Vec<NodeId> = (0..5).map(|i| dom.lazy_in(list, &format!("/page-{}", i), &[("data-lazyparent", "")], on_screen())).collect();
	let (mut loader, _) = new_loader(&dom, Config::default());

	let mut actions = loader.start();
	for i in 0..5 {
		let request = only_fetch(actions);
		assert_eq!(request.url, format!("/page-{}", i));
		actions = loader.complete(request.ticket, ok(&format!("<li>{}</li>", i)), 0);
	}
	assert!(actions.is_empty());

	assert_eq!(dom.html(list), "<li>0</li><li>1</li><li>2</li><li>3</li><li>4</li>");
	for placeholder in placeholders {
		assert!(!dom.is_attached(placeholder));
		assert_eq!(loader.status(&placeholder), None);
	}
}
