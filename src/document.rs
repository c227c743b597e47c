//! Handle-based TiXI document wrapper
//!
//! A [`TixiDocument`] holds at most one native document handle. It is either
//! *unbound* (no handle) or *bound*; `open`, `import_from_string` and
//! `create_document` bind it, `close` (or dropping it) unbinds it.
//!
//! Every operation reports failure through its return value: `false` for boolean
//! operations, an empty string for string reads and zero for numeric reads. A zero
//! returned by [`TixiDocument::get_double_element`] or one of the count queries can
//! be a real value or a failure, so callers must consult [`TixiDocument::last_error`]
//! after those calls.
//!
//! Two kinds of failure exist:
//!
//! - local precondition failures (empty argument, no handle, already bound) are
//!   caught before the native library is called. They are logged and do not change
//!   `last_error`.
//! - native failures carry the status code TiXI returned; it becomes `last_error`.
//!
//! `last_error` is plain per-instance state. Methods that touch it take `&mut self`,
//! so one document cannot be driven from two threads at once without external
//! synchronization.

use std::ffi::{CStr, CString};
use std::path::Path;

use tracing::{debug, error, warn};

use crate::config::LibraryConfig;
use crate::error::{TixiError, TixiResult};
use crate::native::{
    self, DocumentHandle, NativeResult, NativeTixi, OpenMode, SaveMode, SchemaKind, SchemaSource,
    TixiBackend,
};
use crate::status::StatusCode;

/// One TiXI document session
pub struct TixiDocument<B: TixiBackend = NativeTixi> {
    backend: B,
    handle: Option<DocumentHandle>,
    last_error: StatusCode,
}

impl TixiDocument<NativeTixi> {
    /// Create an unbound document backed by the native library
    ///
    /// Loads the library with the default configuration if no earlier call loaded it.
    pub fn new() -> TixiResult<Self> {
        Self::with_library(&LibraryConfig::default())
    }

    /// Create an unbound document, loading the native library from `config` if this is
    /// the first load in the process
    pub fn with_library(config: &LibraryConfig) -> TixiResult<Self> {
        Ok(Self::with_backend(native::initialize(config)?))
    }
}

/// Convert a required string argument for the native call
fn required(
    operation: &'static str,
    argument: &'static str,
    value: &str,
) -> TixiResult<CString> {
    if value.is_empty() {
        return Err(TixiError::InvalidArgument {
            operation,
            argument,
            reason: "must not be empty",
        });
    }
    optional(operation, argument, value)
}

/// Convert an argument that may be empty
fn optional(
    operation: &'static str,
    argument: &'static str,
    value: &str,
) -> TixiResult<CString> {
    CString::new(value).map_err(|_| TixiError::InvalidArgument {
        operation,
        argument,
        reason: "contains a NUL byte",
    })
}

/// Convert a required filesystem path for the native call
fn required_path(
    operation: &'static str,
    argument: &'static str,
    path: &Path,
) -> TixiResult<CString> {
    let value = path.to_str().ok_or(TixiError::InvalidArgument {
        operation,
        argument,
        reason: "is not valid UTF-8",
    })?;
    required(operation, argument, value)
}

/// Split `/a/b/leaf` into (`/a/b`, `leaf`)
fn split_element_path<'a>(
    operation: &'static str,
    element_path: &'a str,
) -> TixiResult<(&'a str, &'a str)> {
    let separator = element_path
        .rfind('/')
        .ok_or(TixiError::InvalidArgument {
            operation,
            argument: "element_path",
            reason: "has no path separator",
        })?;
    Ok((&element_path[..separator], &element_path[separator + 1..]))
}

fn report(error: &TixiError) {
    match error {
        TixiError::AlreadyBound { .. } | TixiError::MissingHandle { operation: "close" } => {
            warn!("{}", error)
        }
        _ => error!("{}", error),
    }
}

/// Turn an operation result into its sentinel-style return value
fn or_sentinel<T: Default>(result: TixiResult<T>) -> T {
    result.unwrap_or_else(|err| {
        report(&err);
        T::default()
    })
}

fn succeeded(result: TixiResult<()>) -> bool {
    result.map_err(|err| report(&err)).is_ok()
}

impl<B: TixiBackend> TixiDocument<B> {
    /// Create an unbound document that delegates native calls to `backend`
    pub fn with_backend(backend: B) -> Self {
        TixiDocument {
            backend,
            handle: None,
            last_error: StatusCode::Success,
        }
    }

    /// Status of the most recent native call made through this instance
    ///
    /// Starts out as [`StatusCode::Success`]. Local precondition failures leave it
    /// unchanged.
    pub fn last_error(&self) -> StatusCode {
        self.last_error
    }

    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    /// The native handle, while bound
    pub fn handle(&self) -> Option<&DocumentHandle> {
        self.handle.as_ref()
    }

    /// Version string of the native library; needs no document
    pub fn version(&self) -> String {
        self.backend.version()
    }

    fn record<T>(&mut self, operation: &'static str, result: NativeResult<T>) -> TixiResult<T> {
        match result {
            Ok(value) => {
                self.last_error = StatusCode::Success;
                Ok(value)
            }
            Err(status) => {
                self.last_error = status;
                Err(TixiError::Native { operation, status })
            }
        }
    }

    /// Run a native call against the bound handle and record its status
    fn with_handle<T>(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&B, &DocumentHandle) -> NativeResult<T>,
    ) -> TixiResult<T> {
        let handle = self
            .handle
            .as_ref()
            .ok_or(TixiError::MissingHandle { operation })?;
        debug!(operation, handle = %handle, "Calling TiXI");
        let result = call(&self.backend, handle);
        self.record(operation, result)
    }

    /// Run a native call that produces a new handle and bind it on success
    fn bind(
        &mut self,
        operation: &'static str,
        call: impl FnOnce(&B) -> NativeResult<DocumentHandle>,
    ) -> TixiResult<()> {
        debug!(operation, "Calling TiXI");
        let result = call(&self.backend);
        let handle = self.record(operation, result)?;
        self.handle = Some(handle);
        Ok(())
    }

    fn ensure_unbound(&self, operation: &'static str) -> TixiResult<()> {
        if self.handle.is_some() {
            return Err(TixiError::AlreadyBound { operation });
        }
        Ok(())
    }

    /// Open an XML file
    ///
    /// With [`OpenMode::Recursive`] the native library also merges the external data
    /// files the document references. Fails without side effects if a document is
    /// already bound.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> bool {
        succeeded(self.try_open(path.as_ref(), mode))
    }

    fn try_open(&mut self, path: &Path, mode: OpenMode) -> TixiResult<()> {
        const OPERATION: &str = "open";
        self.ensure_unbound(OPERATION)?;
        let path = required_path(OPERATION, "path", path)?;
        self.bind(OPERATION, |backend| backend.open_document(&path, mode))
    }

    /// Parse a document from an XML string
    pub fn import_from_string(&mut self, xml: &str) -> bool {
        succeeded(self.try_import_from_string(xml))
    }

    fn try_import_from_string(&mut self, xml: &str) -> TixiResult<()> {
        const OPERATION: &str = "import_from_string";
        self.ensure_unbound(OPERATION)?;
        let xml = required(OPERATION, "xml", xml)?;
        self.bind(OPERATION, |backend| backend.import_from_string(&xml))
    }

    /// Start a new document consisting of an empty root element
    pub fn create_document(&mut self, root_element_name: &str) -> bool {
        succeeded(self.try_create_document(root_element_name))
    }

    fn try_create_document(&mut self, root_element_name: &str) -> TixiResult<()> {
        const OPERATION: &str = "create_document";
        self.ensure_unbound(OPERATION)?;
        let root = required(OPERATION, "root_element_name", root_element_name)?;
        self.bind(OPERATION, |backend| backend.create_document(&root))
    }

    /// Release the bound document
    ///
    /// The instance is unbound afterwards even if the native library reports a
    /// failure; the return value tells whether the release succeeded. Closing an
    /// unbound instance does nothing and returns `false`.
    pub fn close(&mut self) -> bool {
        succeeded(self.try_close())
    }

    fn try_close(&mut self) -> TixiResult<()> {
        const OPERATION: &str = "close";
        let handle = self.handle.take().ok_or(TixiError::MissingHandle {
            operation: OPERATION,
        })?;
        debug!(operation = OPERATION, handle = %handle, "Calling TiXI");
        let result = self.backend.close_document(handle);
        self.record(OPERATION, result)
    }

    /// Serialize the bound document
    pub fn export_as_string(&mut self) -> String {
        or_sentinel(self.with_handle("export_as_string", |backend, handle| {
            backend.export_document_as_string(handle)
        }))
    }

    /// Add an element named `element_name` below `parent_path`, optionally with text
    ///
    /// Elements with the same name can be added repeatedly. `None` (or an empty text)
    /// creates an element without a text node.
    pub fn add_text_element(
        &mut self,
        parent_path: &str,
        element_name: &str,
        text: Option<&str>,
    ) -> bool {
        succeeded(self.try_add_text_element("add_text_element", parent_path, element_name, text))
    }

    /// Like [`Self::add_text_element`], with parent and name given as one path
    ///
    /// `/plane/wings/wing` adds a `wing` element below `/plane/wings`.
    pub fn add_text_element_at_path(&mut self, element_path: &str, text: Option<&str>) -> bool {
        succeeded(self.try_add_text_element_at_path(element_path, text))
    }

    fn try_add_text_element_at_path(
        &mut self,
        element_path: &str,
        text: Option<&str>,
    ) -> TixiResult<()> {
        const OPERATION: &str = "add_text_element_at_path";
        self.require_handle(OPERATION)?;
        let (parent_path, element_name) = split_element_path(OPERATION, element_path)?;
        self.try_add_text_element(OPERATION, parent_path, element_name, text)
    }

    fn try_add_text_element(
        &mut self,
        operation: &'static str,
        parent_path: &str,
        element_name: &str,
        text: Option<&str>,
    ) -> TixiResult<()> {
        self.require_handle(operation)?;
        let parent_path = required(operation, "parent_path", parent_path)?;
        let element_name = required(operation, "element_name", element_name)?;
        let text = optional(operation, "text", text.unwrap_or_default())?;
        self.with_handle(operation, |backend, handle| {
            backend.add_text_element(handle, &parent_path, &element_name, &text)
        })
    }

    /// Set a text attribute on the element at `element_path`
    pub fn add_text_attribute(
        &mut self,
        element_path: &str,
        attribute_name: &str,
        value: &str,
    ) -> bool {
        succeeded(self.try_add_text_attribute(element_path, attribute_name, value))
    }

    fn try_add_text_attribute(
        &mut self,
        element_path: &str,
        attribute_name: &str,
        value: &str,
    ) -> TixiResult<()> {
        const OPERATION: &str = "add_text_attribute";
        self.require_handle(OPERATION)?;
        let element_path = required(OPERATION, "element_path", element_path)?;
        let attribute_name = required(OPERATION, "attribute_name", attribute_name)?;
        let value = optional(OPERATION, "value", value)?;
        self.with_handle(OPERATION, |backend, handle| {
            backend.add_text_attribute(handle, &element_path, &attribute_name, &value)
        })
    }

    /// Value of attribute `attribute_name` on the element at `element_path`
    pub fn get_text_attribute(&mut self, element_path: &str, attribute_name: &str) -> String {
        or_sentinel(self.try_get_text_attribute(element_path, attribute_name))
    }

    fn try_get_text_attribute(
        &mut self,
        element_path: &str,
        attribute_name: &str,
    ) -> TixiResult<String> {
        const OPERATION: &str = "get_text_attribute";
        self.require_handle(OPERATION)?;
        let element_path = required(OPERATION, "element_path", element_path)?;
        let attribute_name = required(OPERATION, "attribute_name", attribute_name)?;
        self.with_handle(OPERATION, |backend, handle| {
            backend.get_text_attribute(handle, &element_path, &attribute_name)
        })
    }

    /// Text content of the element at `element_path`
    pub fn get_text_element(&mut self, element_path: &str) -> String {
        or_sentinel(self.single_argument(
            "get_text_element",
            "element_path",
            element_path,
            |backend, handle, path| backend.get_text_element(handle, path),
        ))
    }

    /// Numeric content of the element at `element_path`
    ///
    /// Returns `0.0` on failure, which is indistinguishable from a stored zero. Check
    /// [`Self::last_error`] when zero is a plausible value.
    pub fn get_double_element(&mut self, element_path: &str) -> f64 {
        or_sentinel(self.single_argument(
            "get_double_element",
            "element_path",
            element_path,
            |backend, handle, path| backend.get_double_element(handle, path),
        ))
    }

    /// Number of children named `child_name` below `element_path`; `0` on failure
    pub fn get_named_children_count(&mut self, element_path: &str, child_name: &str) -> i32 {
        or_sentinel(self.try_get_named_children_count(element_path, child_name))
    }

    fn try_get_named_children_count(
        &mut self,
        element_path: &str,
        child_name: &str,
    ) -> TixiResult<i32> {
        const OPERATION: &str = "get_named_children_count";
        self.require_handle(OPERATION)?;
        let element_path = required(OPERATION, "element_path", element_path)?;
        let child_name = required(OPERATION, "child_name", child_name)?;
        self.with_handle(OPERATION, |backend, handle| {
            backend.get_named_children_count(handle, &element_path, &child_name)
        })
    }

    /// Replace the text of the element at `element_path`
    pub fn update_text_element(&mut self, element_path: &str, text: &str) -> bool {
        succeeded(self.try_update_text_element(element_path, text))
    }

    fn try_update_text_element(&mut self, element_path: &str, text: &str) -> TixiResult<()> {
        const OPERATION: &str = "update_text_element";
        self.require_handle(OPERATION)?;
        let element_path = required(OPERATION, "element_path", element_path)?;
        let text = required(OPERATION, "text", text)?;
        self.with_handle(OPERATION, |backend, handle| {
            backend.update_text_element(handle, &element_path, &text)
        })
    }

    /// Remove the element at `element_path` and its subtree
    pub fn remove_element(&mut self, element_path: &str) -> bool {
        succeeded(self.single_argument(
            "remove_element",
            "element_path",
            element_path,
            |backend, handle, path| backend.remove_element(handle, path),
        ))
    }

    /// Whether an element exists at `element_path`
    ///
    /// A missing element returns `false` and records [`StatusCode::ElementNotFound`]
    /// without logging an error.
    pub fn check_element(&mut self, element_path: &str) -> bool {
        let result = self.single_argument(
            "check_element",
            "element_path",
            element_path,
            |backend, handle, path| backend.check_element(handle, path),
        );
        match result {
            Err(TixiError::Native {
                status: StatusCode::ElementNotFound,
                ..
            }) => false,
            other => succeeded(other),
        }
    }

    /// Text of the `index`-th node matched by `expression`
    ///
    /// Indices are 1-based and must not exceed
    /// [`Self::xpath_evaluate_node_number`] for the same expression.
    pub fn xpath_get_text_by_index(&mut self, expression: &str, index: i32) -> String {
        or_sentinel(self.single_argument(
            "xpath_get_text_by_index",
            "expression",
            expression,
            |backend, handle, expression| {
                backend.xpath_get_text_by_index(handle, expression, index)
            },
        ))
    }

    /// Number of nodes matched by `expression`; `0` on failure
    pub fn xpath_evaluate_node_number(&mut self, expression: &str) -> i32 {
        or_sentinel(self.single_argument(
            "xpath_evaluate_node_number",
            "expression",
            expression,
            |backend, handle, expression| backend.xpath_evaluate_node_number(handle, expression),
        ))
    }

    /// Write the bound document to `path`
    ///
    /// `mode` selects how external data merged by a recursive open is written.
    pub fn save(&mut self, path: impl AsRef<Path>, mode: SaveMode) -> bool {
        succeeded(self.try_save(path.as_ref(), mode))
    }

    fn try_save(&mut self, path: &Path, mode: SaveMode) -> TixiResult<()> {
        const OPERATION: &str = "save";
        self.require_handle(OPERATION)?;
        let path = required_path(OPERATION, "path", path)?;
        self.with_handle(OPERATION, |backend, handle| {
            backend.save_document(handle, &path, mode)
        })
    }

    /// Validate the bound document against an XML schema
    pub fn schema_validate(&mut self, schema: SchemaSource<'_>) -> bool {
        succeeded(self.try_schema_validate(schema))
    }

    fn try_schema_validate(&mut self, schema: SchemaSource<'_>) -> TixiResult<()> {
        const OPERATION: &str = "schema_validate";
        self.require_handle(OPERATION)?;
        let (kind, schema) = match schema {
            SchemaSource::File(path) => {
                (SchemaKind::File, required_path(OPERATION, "schema", path)?)
            }
            SchemaSource::FileWithDefaults(path) => (
                SchemaKind::FileWithDefaults,
                required_path(OPERATION, "schema", path)?,
            ),
            SchemaSource::String(xsd) => {
                (SchemaKind::String, required(OPERATION, "schema", xsd)?)
            }
        };
        self.with_handle(OPERATION, |backend, handle| {
            backend.schema_validate(handle, kind, &schema)
        })
    }

    /// Shared shape of the operations taking one path or expression argument
    fn single_argument<T>(
        &mut self,
        operation: &'static str,
        argument: &'static str,
        value: &str,
        call: impl FnOnce(&B, &DocumentHandle, &CStr) -> NativeResult<T>,
    ) -> TixiResult<T> {
        self.require_handle(operation)?;
        let value = required(operation, argument, value)?;
        self.with_handle(operation, |backend, handle| call(backend, handle, &value))
    }

    fn require_handle(&self, operation: &'static str) -> TixiResult<()> {
        if self.handle.is_none() {
            return Err(TixiError::MissingHandle { operation });
        }
        Ok(())
    }
}

impl<B: TixiBackend> Drop for TixiDocument<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take()
            && let Err(status) = self.backend.close_document(handle)
        {
            error!(status = %status, "Closing TiXI document on drop failed");
        }
    }
}
