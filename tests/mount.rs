use cambium::{build, memory::MemoryDocument, mount, resolve, AttributeValue, Child, Component, Composite, Context, Document, Error, Node, Rendered};
use std::{cell::Cell, rc::Rc};

type D = MemoryDocument;

fn init_logging() {
	let _ = tracing_subscriber::fmt()
		.with_max_level(tracing::Level::TRACE)
		.with_test_writer()
		.try_init();
}

fn no_attributes() -> Vec<(&'static str, &'static str)> {
	Vec::new()
}

#[test]
fn attribute_round_trip() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	let root = build(
		"div",
		vec![("id", "test"), ("class", "class1")],
		vec![Child::<D>::from("text1")],
	);
	let _mounted = mount(&root, document.clone(), &body).unwrap();

	let div = document.child_nodes(body)[0];
	assert_eq!(document.tag(div).as_deref(), Some("div"));
	assert_eq!(document.attribute(div, "id").as_deref(), Some("test"));
	assert_eq!(document.attribute(div, "class").as_deref(), Some("class1"));
	let text = document.child_nodes(div)[0];
	assert_eq!(document.text(text).as_deref(), Some("text1"));
}

#[test]
fn class_name_becomes_class() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	let _mounted = mount(&build("p", vec![("className", "c2")], Vec::<Child<D>>::new()), document.clone(), &body).unwrap();

	let p = document.child_nodes(body)[0];
	assert_eq!(document.attribute(p, "class").as_deref(), Some("c2"));
	assert_eq!(document.attribute(p, "className"), None);
	assert_eq!(document.attribute_names(p), ["class"]);
}

#[test]
fn on_click_registers_a_listener() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	let clicks = Rc::new(Cell::new(0));
	let listener = AttributeValue::<D>::listener({
		let clicks = clicks.clone();
		move |event| {
			assert_eq!(event.name, "click");
			clicks.set(clicks.get() + 1)
		}
	});
	let _mounted = mount(&build("button", vec![("onClick", listener)], Vec::new()), document.clone(), &body).unwrap();

	let button = document.child_nodes(body)[0];
	assert_eq!(document.attribute_names(button), Vec::<String>::new());
	assert_eq!(document.listener_count(button, "click"), 1);

	assert_eq!(clicks.get(), 0);
	document.dispatch(button, "click").unwrap();
	assert_eq!(clicks.get(), 1);
	document.dispatch(button, "mousedown").unwrap();
	assert_eq!(clicks.get(), 1);
}

#[test]
fn mount_clears_container() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();
	let container = document.create_element("main").unwrap();
	document.append_child(body, container).unwrap();
	for tag in ["header", "section"] {
		let child = document.create_element(tag).unwrap();
		document.append_child(container, child).unwrap();
	}
	let old = document.child_nodes(container);

	let _mounted = mount(&build("article", no_attributes(), vec![Child::<D>::from("new")]), document.clone(), &container).unwrap();

	assert_eq!(document.inner_html(container), "<article>new</article>");
	for node in old {
		assert_eq!(document.parent(node), None);
	}
}

#[test]
fn mount_returns_a_cursor_over_the_root() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	let mounted = mount(&Node::<D>::text("hello"), document.clone(), &body).unwrap();
	let text = document.child_nodes(body)[0];
	assert_eq!(mounted.cursor().spanned(), Some(text));
	assert!(!mounted.cursor().is_stale());
	assert!(mounted.composites().is_empty());
}

#[test]
fn missing_container() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();
	let text = document.create_text_node("not a container");
	document.append_child(body, text).unwrap();

	let result = mount(&Node::<D>::element("div"), document.clone(), &text);
	assert!(matches!(result, Err(Error::MissingContainer(_))), "{:?}", result);
	assert_eq!(document.inner_html(body), "not a container");
}

#[test]
fn invalid_tag() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	let result = mount(&Node::<D>::element("not a tag"), document.clone(), &body);
	assert!(matches!(result, Err(Error::Dom { operation: "createElement", .. })), "{:?}", result);
}

struct Fragment(usize);
impl Component<D> for Fragment {
	fn render(&self, _: &Context<'_, D>) -> Rendered<D> {
		(0..self.0).map(|i| Node::text(i.to_string())).collect::<Vec<_>>().into()
	}
}

#[test]
fn render_must_produce_exactly_one_node() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	for count in [0, 2] {
		let result = mount(&Composite::new(Fragment(count)).into(), document.clone(), &body);
		match result {
			Err(Error::InvalidRenderResult { component, count: actual }) => {
				assert!(component.ends_with("Fragment"));
				assert_eq!(actual, count);
			}
			other => panic!("Expected `InvalidRenderResult`, got {:?}", other),
		}
	}

	let _mounted = mount(&Composite::new(Fragment(1)).into(), document.clone(), &body).unwrap();
	assert_eq!(document.inner_html(body), "0");
}

struct Recursive;
impl Component<D> for Recursive {
	fn render(&self, _: &Context<'_, D>) -> Rendered<D> {
		Composite::new(Recursive).into()
	}
}

#[test]
fn self_rendering_components_hit_the_depth_limit() {
	// Unoptimized frames are large.
	std::thread::Builder::new()
		.stack_size(64 * 1024 * 1024)
		.spawn(|| {
			let document = Rc::new(MemoryDocument::new());
			let body = document.body();

			let result = mount(&Composite::new(Recursive).into(), document.clone(), &body);
			assert_eq!(result.unwrap_err(), Error::DepthLimit(cambium::RENDER_DEPTH_LIMIT));
			assert_eq!(document.inner_html(body), "");
		})
		.unwrap()
		.join()
		.unwrap();
}

#[test]
fn element_nesting_does_not_count_towards_the_depth_limit() {
	std::thread::Builder::new()
		.stack_size(64 * 1024 * 1024)
		.spawn(|| {
			let document = Rc::new(MemoryDocument::new());
			let body = document.body();

			let depth = cambium::RENDER_DEPTH_LIMIT + 44;
			let root = (0..depth).fold(Node::<D>::text("deep"), |inner, _| build("div", no_attributes(), vec![Child::from(inner)]));
			let _mounted = mount(&root, document.clone(), &body).unwrap();

			let mut node = document.child_nodes(body)[0];
			for _ in 1..depth {
				node = document.child_nodes(node)[0];
			}
			assert_eq!(document.inner_html(node), "deep");
		})
		.unwrap()
		.join()
		.unwrap();
}

struct Card;
impl Component<D> for Card {
	fn render(&self, cx: &Context<'_, D>) -> Rendered<D> {
		let title = cx.prop_text("title").unwrap_or_default();
		build(
			"section",
			no_attributes(),
			vec![Child::from(build("h1", no_attributes(), vec![Child::from(title)])), Child::from(cx.children().to_vec())],
		)
		.into()
	}
}

#[test]
fn composites_receive_props_and_children() {
	init_logging();
	let document = Rc::new(MemoryDocument::new());
	let body = document.body();

	let root = build(
		Composite::new(Card),
		vec![("title", "Hello")],
		vec![Child::from("a"), Child::from(build("b", no_attributes(), vec![Child::from("c")]))],
	);
	let _mounted = mount(&root, document.clone(), &body).unwrap();

	assert_eq!(document.inner_html(body), "<section><h1>Hello</h1>a<b>c</b></section>");
}

#[test]
fn resolution_is_idempotent() {
	init_logging();
	let card = Composite::new(Card);
	let root: Node<D> = build(card.clone(), vec![("title", "t")], vec![Child::from("x")]);

	let first = resolve(&root).unwrap();
	let second = resolve(&root).unwrap();
	assert_eq!(first, second);
	assert!(!first.ptr_eq(&second));
	assert_eq!(card.vdom(), None);
}
