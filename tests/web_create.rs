#![cfg(target_arch = "wasm32")]

use cambium::{build, mount, web::WebDocument, Child};
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

fn init_logging() {
	static INIT: std::sync::Once = std::sync::Once::new();
	INIT.call_once(tracing_wasm::set_as_global_default);
}

fn container(document: &WebDocument, id: &str) -> web_sys::Node {
	let body = document.document().body().unwrap();
	let container = document.document().create_element("div").unwrap();
	container.set_id(id);
	body.append_child(&container).unwrap();
	container.into()
}

#[wasm_bindgen_test]
fn element_with_attributes() {
	init_logging();
	let document = Rc::new(WebDocument::from_window().unwrap());
	let container = container(&document, "create-element");

	let root = build(
		"div",
		vec![("id", "test"), ("className", "class1")],
		vec![Child::<WebDocument>::from("text1")],
	);
	let _mounted = mount(&root, document.clone(), &container).unwrap();

	let div: HtmlElement = document.document().get_element_by_id("test").unwrap().dyn_into().unwrap();
	assert_eq!(div.class_name(), "class1");
	assert!(div.get_attribute("className").is_none());
	assert_eq!(div.inner_text(), "text1");
}

#[wasm_bindgen_test]
fn mount_clears_container() {
	init_logging();
	let document = Rc::new(WebDocument::from_window().unwrap());
	let container = container(&document, "create-clear");
	container.dyn_ref::<web_sys::Element>().unwrap().set_inner_html("<p>old</p>old text");

	let _mounted = mount(&build("span", Vec::<(&str, &str)>::new(), vec![Child::from("new")]), document.clone(), &container).unwrap();

	assert_eq!(container.dyn_ref::<web_sys::Element>().unwrap().inner_html(), "<span>new</span>");
}

#[wasm_bindgen_test]
fn missing_container() {
	init_logging();
	let document = Rc::new(WebDocument::from_window().unwrap());

	let result = cambium::web::mount_to_element_id(&cambium::Node::text("unused"), document, "does-not-exist");
	assert!(matches!(result, Err(cambium::Error::MissingContainer(_))), "{:?}", result);
}
