use std::collections::{BTreeMap, HashMap, HashSet};
use std::ffi::CStr;
use std::sync::{Arc, Mutex};

use tixi_rs::{
    DocumentHandle, NativeResult, OpenMode, SaveMode, SchemaKind, StatusCode, TixiBackend,
};

/// One call that reached the backend
#[derive(Clone, Debug, PartialEq)]
pub struct NativeCall {
    pub operation: &'static str,
    pub arguments: Vec<String>,
}

#[derive(Default)]
struct BackendState {
    calls: Vec<NativeCall>,
    next_handle: i32,
    open_handles: HashSet<i32>,
    /// Element path to the text of every element at that path, in insertion order
    elements: BTreeMap<String, Vec<String>>,
    attributes: HashMap<(String, String), String>,
    imported: String,
    forced: HashMap<&'static str, StatusCode>,
    saved: Vec<(String, SaveMode)>,
}

/// In-memory stand-in for the native library
///
/// Elements are stored by absolute path; repeated elements share a path. Clones share
/// state, so a test can keep one clone for inspection after moving another into a
/// document.
#[derive(Clone, Default)]
pub struct RecordingBackend {
    state: Arc<Mutex<BackendState>>,
}

fn text(value: &CStr) -> String {
    value.to_string_lossy().into_owned()
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an element that every document opened through this backend contains
    pub fn with_element(self, path: &str, text: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .elements
            .entry(path.to_string())
            .or_default()
            .push(text.to_string());
        self
    }

    /// Make every call to `operation` fail with `status`
    pub fn failing(self, operation: &'static str, status: StatusCode) -> Self {
        self.state.lock().unwrap().forced.insert(operation, status);
        self
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn operations(&self) -> Vec<&'static str> {
        self.calls().iter().map(|call| call.operation).collect()
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().unwrap().open_handles.len()
    }

    pub fn saved(&self) -> Vec<(String, SaveMode)> {
        self.state.lock().unwrap().saved.clone()
    }

    /// Log the call, then apply any forced failure
    fn enter(&self, operation: &'static str, arguments: &[&CStr]) -> NativeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(NativeCall {
            operation,
            arguments: arguments.iter().map(|argument| text(argument)).collect(),
        });
        match state.forced.get(operation) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }

    fn enter_bound(
        &self,
        operation: &'static str,
        handle: &DocumentHandle,
        arguments: &[&CStr],
    ) -> NativeResult<()> {
        self.enter(operation, arguments)?;
        if !self.state.lock().unwrap().open_handles.contains(&handle.raw()) {
            return Err(StatusCode::InvalidHandle);
        }
        Ok(())
    }

    fn issue_handle(&self) -> DocumentHandle {
        let mut state = self.state.lock().unwrap();
        state.next_handle += 1;
        let raw = state.next_handle;
        state.open_handles.insert(raw);
        DocumentHandle::from_raw(raw)
    }

    fn texts(&self, path: &CStr) -> NativeResult<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .elements
            .get(&text(path))
            .cloned()
            .ok_or(StatusCode::ElementNotFound)
    }

    fn single_text(&self, path: &CStr) -> NativeResult<String> {
        let texts = self.texts(path)?;
        match texts.as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(StatusCode::ElementPathNotUnique),
        }
    }
}

impl TixiBackend for RecordingBackend {
    fn version(&self) -> String {
        "3.3.0-recording".to_string()
    }

    fn open_document(&self, path: &CStr, mode: OpenMode) -> NativeResult<DocumentHandle> {
        let mode = if mode == OpenMode::Recursive {
            c"recursive"
        } else {
            c"plain"
        };
        self.enter("open_document", &[path, mode])?;
        if text(path).contains("missing") {
            return Err(StatusCode::OpenFailed);
        }
        Ok(self.issue_handle())
    }

    fn import_from_string(&self, xml: &CStr) -> NativeResult<DocumentHandle> {
        self.enter("import_from_string", &[xml])?;
        let xml = text(xml);
        if !xml.trim_start().starts_with('<') {
            return Err(StatusCode::NotWellFormed);
        }
        self.state.lock().unwrap().imported = xml;
        Ok(self.issue_handle())
    }

    fn create_document(&self, root_element_name: &CStr) -> NativeResult<DocumentHandle> {
        self.enter("create_document", &[root_element_name])?;
        let root = format!("/{}", text(root_element_name));
        {
            let mut state = self.state.lock().unwrap();
            state.imported = format!("<{}/>", text(root_element_name));
            state.elements.insert(root, vec![String::new()]);
        }
        Ok(self.issue_handle())
    }

    fn close_document(&self, handle: DocumentHandle) -> NativeResult<()> {
        self.enter("close_document", &[])?;
        if !self.state.lock().unwrap().open_handles.remove(&handle.raw()) {
            return Err(StatusCode::InvalidHandle);
        }
        Ok(())
    }

    fn export_document_as_string(&self, handle: &DocumentHandle) -> NativeResult<String> {
        self.enter_bound("export_document_as_string", handle, &[])?;
        Ok(self.state.lock().unwrap().imported.clone())
    }

    fn add_text_element(
        &self,
        handle: &DocumentHandle,
        parent_path: &CStr,
        element_name: &CStr,
        text_value: &CStr,
    ) -> NativeResult<()> {
        self.enter_bound(
            "add_text_element",
            handle,
            &[parent_path, element_name, text_value],
        )?;
        self.texts(parent_path)?;
        let path = format!("{}/{}", text(parent_path), text(element_name));
        self.state
            .lock()
            .unwrap()
            .elements
            .entry(path)
            .or_default()
            .push(text(text_value));
        Ok(())
    }

    fn add_text_attribute(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        attribute_name: &CStr,
        value: &CStr,
    ) -> NativeResult<()> {
        self.enter_bound(
            "add_text_attribute",
            handle,
            &[element_path, attribute_name, value],
        )?;
        self.texts(element_path)?;
        self.state
            .lock()
            .unwrap()
            .attributes
            .insert((text(element_path), text(attribute_name)), text(value));
        Ok(())
    }

    fn get_text_attribute(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        attribute_name: &CStr,
    ) -> NativeResult<String> {
        self.enter_bound("get_text_attribute", handle, &[element_path, attribute_name])?;
        self.texts(element_path)?;
        self.state
            .lock()
            .unwrap()
            .attributes
            .get(&(text(element_path), text(attribute_name)))
            .cloned()
            .ok_or(StatusCode::AttributeNotFound)
    }

    fn get_text_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
    ) -> NativeResult<String> {
        self.enter_bound("get_text_element", handle, &[element_path])?;
        self.single_text(element_path)
    }

    fn get_double_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
    ) -> NativeResult<f64> {
        self.enter_bound("get_double_element", handle, &[element_path])?;
        self.single_text(element_path)?
            .trim()
            .parse()
            .map_err(|_| StatusCode::NoNumber)
    }

    fn get_named_children_count(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        child_name: &CStr,
    ) -> NativeResult<i32> {
        self.enter_bound(
            "get_named_children_count",
            handle,
            &[element_path, child_name],
        )?;
        self.texts(element_path)?;
        let child = format!("{}/{}", text(element_path), text(child_name));
        let count = self
            .state
            .lock()
            .unwrap()
            .elements
            .get(&child)
            .map_or(0, Vec::len);
        Ok(count as i32)
    }

    fn update_text_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        text_value: &CStr,
    ) -> NativeResult<()> {
        self.enter_bound("update_text_element", handle, &[element_path, text_value])?;
        self.single_text(element_path)?;
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(text(element_path), vec![text(text_value)]);
        Ok(())
    }

    fn remove_element(&self, handle: &DocumentHandle, element_path: &CStr) -> NativeResult<()> {
        self.enter_bound("remove_element", handle, &[element_path])?;
        self.texts(element_path)?;
        let path = text(element_path);
        let subtree = format!("{}/", path);
        self.state
            .lock()
            .unwrap()
            .elements
            .retain(|key, _| *key != path && !key.starts_with(&subtree));
        Ok(())
    }

    fn check_element(&self, handle: &DocumentHandle, element_path: &CStr) -> NativeResult<()> {
        self.enter_bound("check_element", handle, &[element_path])?;
        self.texts(element_path).map(|_| ())
    }

    fn xpath_get_text_by_index(
        &self,
        handle: &DocumentHandle,
        expression: &CStr,
        index: i32,
    ) -> NativeResult<String> {
        self.enter_bound("xpath_get_text_by_index", handle, &[expression])?;
        let texts = self.texts(expression)?;
        usize::try_from(index)
            .ok()
            .and_then(|index| index.checked_sub(1))
            .and_then(|index| texts.get(index).cloned())
            .ok_or(StatusCode::IndexOutOfRange)
    }

    fn xpath_evaluate_node_number(
        &self,
        handle: &DocumentHandle,
        expression: &CStr,
    ) -> NativeResult<i32> {
        self.enter_bound("xpath_evaluate_node_number", handle, &[expression])?;
        Ok(self.texts(expression).map_or(0, |texts| texts.len() as i32))
    }

    fn save_document(
        &self,
        handle: &DocumentHandle,
        path: &CStr,
        mode: SaveMode,
    ) -> NativeResult<()> {
        self.enter_bound("save_document", handle, &[path])?;
        self.state.lock().unwrap().saved.push((text(path), mode));
        Ok(())
    }

    fn schema_validate(
        &self,
        handle: &DocumentHandle,
        kind: SchemaKind,
        schema: &CStr,
    ) -> NativeResult<()> {
        self.enter_bound("schema_validate", handle, &[schema])?;
        match kind {
            SchemaKind::String if !text(schema).contains("schema") => {
                Err(StatusCode::NotWellFormed)
            }
            _ if text(schema).contains("strict") => Err(StatusCode::NotSchemaCompliant),
            _ => Ok(()),
        }
    }
}
