#![cfg(target_arch = "wasm32")]

use cambium::{build, json, mount, web::WebDocument, Child, Component, Composite, Context, Node, Rendered, Value};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};

wasm_bindgen_test_configure!(run_in_browser);

struct List;
impl Component<WebDocument> for List {
	fn initial_state(&self) -> Option<Value> {
		Some(json!({ "tag": "ul", "count": 1 }))
	}

	fn render(&self, cx: &Context<'_, WebDocument>) -> Rendered<WebDocument> {
		let state = cx.state().cloned().unwrap_or_default();
		let items: Vec<Node<WebDocument>> = (0..state["count"].as_u64().unwrap_or(0))
			.map(|i| build("li", Vec::<(&str, &str)>::new(), vec![Child::from(i.to_string())]))
			.collect();
		build(state["tag"].as_str().unwrap_or("ul"), Vec::<(&str, &str)>::new(), vec![Child::from(items)]).into()
	}
}

#[wasm_bindgen_test]
fn append_then_replace() {
	static INIT: std::sync::Once = std::sync::Once::new();
	INIT.call_once(tracing_wasm::set_as_global_default);

	let document = Rc::new(WebDocument::from_window().unwrap());
	let container = document.document().create_element("div").unwrap();
	document.document().body().unwrap().append_child(&container).unwrap();

	let list = Composite::new(List);
	let _mounted = mount(&list.clone().into(), document.clone(), &container.clone().into()).unwrap();
	let first = container.query_selector("li").unwrap().unwrap();

	list.set_state(json!({ "count": 3 })).unwrap();
	assert_eq!(container.inner_html(), "<ul><li>0</li><li>1</li><li>2</li></ul>");
	assert!(container.query_selector("li").unwrap().unwrap().is_same_node(Some(first.unchecked_ref())));

	list.set_state(json!({ "tag": "ol" })).unwrap();
	assert_eq!(container.inner_html(), "<ol><li>0</li><li>1</li><li>2</li></ol>");
	assert!(first.parent_node().is_none());
}
