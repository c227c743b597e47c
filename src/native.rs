//! Native TiXI FFI layer
//!
//! This module owns everything that touches the C ABI of the TiXI library:
//!
//! - loading the shared library (and any dependencies it needs preloaded) exactly once
//!   per process
//! - resolving every entry point the binding uses up front, so a missing symbol is a
//!   load error rather than a failure in the middle of a document session
//! - the [`TixiBackend`] trait, which is the seam between [`crate::TixiDocument`] and
//!   the native calls. [`NativeTixi`] is the production implementation; tests plug in
//!   recording or mock backends.
//!
//! ## Memory ownership
//!
//! Strings TiXI hands back through `char**` out-parameters belong to the document and
//! are released when it is closed. They are copied into owned `String`s immediately and
//! never freed from Rust.
//!
//! ## Thread safety
//!
//! The loaded library is shared process-wide and never unloaded. Whether TiXI itself
//! tolerates concurrent calls on different documents is up to the native build; the
//! binding adds no locking of its own.

use std::ffi::{CStr, OsString};
use std::fmt;
use std::path::Path;
use std::ptr;
use std::sync::OnceLock;

use libc::{c_char, c_double, c_int};
use libloading::Library;
use tracing::{debug, info};

use crate::config::LibraryConfig;
use crate::error::{TixiError, TixiResult};
use crate::status::StatusCode;

/// Result of a native call: the output value, or the non-success status it returned
pub type NativeResult<T> = std::result::Result<T, StatusCode>;

/// Opaque handle to a document held by the native library
///
/// Not `Clone` or `Copy`: a handle belongs to exactly one [`crate::TixiDocument`] and
/// is consumed when the document is closed.
#[derive(Debug, PartialEq, Eq)]
pub struct DocumentHandle(c_int);

impl DocumentHandle {
    /// Wrap a raw handle issued by the native library
    ///
    /// Only [`TixiBackend`] implementations should construct handles.
    pub fn from_raw(raw: c_int) -> Self {
        DocumentHandle(raw)
    }

    /// The raw native handle value
    pub fn raw(&self) -> c_int {
        self.0
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a document is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    /// Only the given file
    #[default]
    Plain,
    /// External data files referenced by the document are merged into the tree
    Recursive,
}

impl OpenMode {
    pub fn as_raw(self) -> c_int {
        match self {
            OpenMode::Plain => 0,
            OpenMode::Recursive => 1,
        }
    }
}

/// Which native save entry point to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// `tixiSaveDocument`: external data is written back to its own files
    #[default]
    Plain,
    /// `tixiSaveCompleteDocument`: everything is written into one file
    Complete,
    /// `tixiSaveAndRemoveDocument`: external data nodes are dropped before saving
    RemoveIncluded,
}

/// Schema to validate the bound document against
#[derive(Debug, Clone, Copy)]
pub enum SchemaSource<'a> {
    File(&'a Path),
    /// Validate from file and fill in schema default values
    FileWithDefaults(&'a Path),
    String(&'a str),
}

/// Which native validation entry point to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    File,
    FileWithDefaults,
    String,
}

/// The native operations a document wrapper needs
///
/// Arguments arrive already validated and converted to C strings; implementations
/// only perform the call and report the status.
#[cfg_attr(test, mockall::automock)]
pub trait TixiBackend {
    fn version(&self) -> String;

    fn open_document(&self, path: &CStr, mode: OpenMode) -> NativeResult<DocumentHandle>;

    fn import_from_string(&self, xml: &CStr) -> NativeResult<DocumentHandle>;

    fn create_document(&self, root_element_name: &CStr) -> NativeResult<DocumentHandle>;

    fn close_document(&self, handle: DocumentHandle) -> NativeResult<()>;

    fn export_document_as_string(&self, handle: &DocumentHandle) -> NativeResult<String>;

    fn add_text_element(
        &self,
        handle: &DocumentHandle,
        parent_path: &CStr,
        element_name: &CStr,
        text: &CStr,
    ) -> NativeResult<()>;

    fn add_text_attribute(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        attribute_name: &CStr,
        value: &CStr,
    ) -> NativeResult<()>;

    fn get_text_attribute(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        attribute_name: &CStr,
    ) -> NativeResult<String>;

    fn get_text_element(&self, handle: &DocumentHandle, element_path: &CStr)
    -> NativeResult<String>;

    fn get_double_element(&self, handle: &DocumentHandle, element_path: &CStr)
    -> NativeResult<f64>;

    fn get_named_children_count(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        child_name: &CStr,
    ) -> NativeResult<i32>;

    fn update_text_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        text: &CStr,
    ) -> NativeResult<()>;

    fn remove_element(&self, handle: &DocumentHandle, element_path: &CStr) -> NativeResult<()>;

    fn check_element(&self, handle: &DocumentHandle, element_path: &CStr) -> NativeResult<()>;

    fn xpath_get_text_by_index(
        &self,
        handle: &DocumentHandle,
        expression: &CStr,
        index: i32,
    ) -> NativeResult<String>;

    fn xpath_evaluate_node_number(
        &self,
        handle: &DocumentHandle,
        expression: &CStr,
    ) -> NativeResult<i32>;

    fn save_document(&self, handle: &DocumentHandle, path: &CStr, mode: SaveMode)
    -> NativeResult<()>;

    fn schema_validate(
        &self,
        handle: &DocumentHandle,
        kind: SchemaKind,
        schema: &CStr,
    ) -> NativeResult<()>;
}

type GetVersionFn = unsafe extern "C" fn() -> *const c_char;
type OpenDocumentFn = unsafe extern "C" fn(*const c_char, *mut c_int, c_int) -> c_int;
type NewDocumentFn = unsafe extern "C" fn(*const c_char, *mut c_int) -> c_int;
type HandleFn = unsafe extern "C" fn(c_int) -> c_int;
type HandleTextOutFn = unsafe extern "C" fn(c_int, *mut *mut c_char) -> c_int;
type PathFn = unsafe extern "C" fn(c_int, *const c_char) -> c_int;
type PathArgFn = unsafe extern "C" fn(c_int, *const c_char, *const c_char) -> c_int;
type PathArgArgFn =
    unsafe extern "C" fn(c_int, *const c_char, *const c_char, *const c_char) -> c_int;
type PathTextOutFn = unsafe extern "C" fn(c_int, *const c_char, *mut *mut c_char) -> c_int;
type PathArgTextOutFn =
    unsafe extern "C" fn(c_int, *const c_char, *const c_char, *mut *mut c_char) -> c_int;
type PathDoubleOutFn = unsafe extern "C" fn(c_int, *const c_char, *mut c_double) -> c_int;
type PathIntOutFn = unsafe extern "C" fn(c_int, *const c_char, *mut c_int) -> c_int;
type PathArgIntOutFn =
    unsafe extern "C" fn(c_int, *const c_char, *const c_char, *mut c_int) -> c_int;
type PathIndexTextOutFn =
    unsafe extern "C" fn(c_int, *const c_char, c_int, *mut *mut c_char) -> c_int;

/// Entry points resolved from the loaded library
struct TixiApi {
    get_version: GetVersionFn,
    open_document_recursive: OpenDocumentFn,
    import_from_string: NewDocumentFn,
    create_document: NewDocumentFn,
    close_document: HandleFn,
    export_document_as_string: HandleTextOutFn,
    add_text_element: PathArgArgFn,
    add_text_attribute: PathArgArgFn,
    get_text_attribute: PathArgTextOutFn,
    get_text_element: PathTextOutFn,
    get_double_element: PathDoubleOutFn,
    get_named_children_count: PathArgIntOutFn,
    update_text_element: PathArgFn,
    remove_element: PathFn,
    check_element: PathFn,
    xpath_get_text_by_index: PathIndexTextOutFn,
    xpath_evaluate_node_number: PathIntOutFn,
    save_document: PathFn,
    save_complete_document: PathFn,
    save_and_remove_document: PathFn,
    schema_validate_from_file: PathFn,
    schema_validate_with_defaults_from_file: PathFn,
    schema_validate_from_string: PathFn,
}

/// Copy a function pointer out of the library
///
/// # Safety
///
/// `T` must match the C signature of `name`, and the returned pointer must not outlive
/// `library`.
unsafe fn symbol<T: Copy>(library: &Library, file: &OsString, name: &str) -> TixiResult<T> {
    let symbol = unsafe { library.get::<T>(name.as_bytes()) }.map_err(|err| {
        TixiError::LibraryLoad {
            library: file.to_string_lossy().into_owned(),
            details: format!("missing symbol {}: {}", name, err),
        }
    })?;
    Ok(*symbol)
}

impl TixiApi {
    /// # Safety
    ///
    /// The loaded library must be a TiXI build exporting the C API in `tixi.h`.
    unsafe fn resolve(library: &Library, file: &OsString) -> TixiResult<Self> {
        unsafe {
            Ok(TixiApi {
                get_version: symbol(library, file, "tixiGetVersion")?,
                open_document_recursive: symbol(library, file, "tixiOpenDocumentRecursive")?,
                import_from_string: symbol(library, file, "tixiImportFromString")?,
                create_document: symbol(library, file, "tixiCreateDocument")?,
                close_document: symbol(library, file, "tixiCloseDocument")?,
                export_document_as_string: symbol(library, file, "tixiExportDocumentAsString")?,
                add_text_element: symbol(library, file, "tixiAddTextElement")?,
                add_text_attribute: symbol(library, file, "tixiAddTextAttribute")?,
                get_text_attribute: symbol(library, file, "tixiGetTextAttribute")?,
                get_text_element: symbol(library, file, "tixiGetTextElement")?,
                get_double_element: symbol(library, file, "tixiGetDoubleElement")?,
                get_named_children_count: symbol(library, file, "tixiGetNamedChildrenCount")?,
                update_text_element: symbol(library, file, "tixiUpdateTextElement")?,
                remove_element: symbol(library, file, "tixiRemoveElement")?,
                check_element: symbol(library, file, "tixiCheckElement")?,
                xpath_get_text_by_index: symbol(
                    library,
                    file,
                    "tixiXPathExpressionGetTextByIndex",
                )?,
                xpath_evaluate_node_number: symbol(library, file, "tixiXPathEvaluateNodeNumber")?,
                save_document: symbol(library, file, "tixiSaveDocument")?,
                save_complete_document: symbol(library, file, "tixiSaveCompleteDocument")?,
                save_and_remove_document: symbol(library, file, "tixiSaveAndRemoveDocument")?,
                schema_validate_from_file: symbol(library, file, "tixiSchemaValidateFromFile")?,
                schema_validate_with_defaults_from_file: symbol(
                    library,
                    file,
                    "tixiSchemaValidateWithDefaultsFromFile",
                )?,
                schema_validate_from_string: symbol(
                    library,
                    file,
                    "tixiSchemaValidateFromString",
                )?,
            })
        }
    }
}

/// A loaded TiXI shared library with all entry points resolved
pub struct NativeLibrary {
    api: TixiApi,
    // Declared after `api` so the function pointers are gone before the code is unloaded,
    // and TiXI is unloaded before the libraries it depends on.
    _library: Library,
    _dependencies: Vec<Library>,
}

impl fmt::Debug for NativeLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeLibrary")
            .field("dependencies", &self._dependencies.len())
            .finish_non_exhaustive()
    }
}

impl NativeLibrary {
    /// Load the library described by `config`
    ///
    /// Dependencies are loaded first, in the configured order, then TiXI itself.
    pub fn load(config: &LibraryConfig) -> TixiResult<Self> {
        let mut dependencies = Vec::with_capacity(config.dependencies.len());
        for file in config.dependency_files() {
            // Safety: loading runs the library's initializers; the dependencies named in
            // the configuration are plain C libraries (zlib, libxml2, ...).
            let library = unsafe { Library::new(&file) }.map_err(|err| TixiError::LibraryLoad {
                library: file.to_string_lossy().into_owned(),
                details: err.to_string(),
            })?;
            debug!(library = %file.to_string_lossy(), "Loaded TiXI dependency");
            dependencies.push(library);
        }

        let file = config.library_file();
        // Safety: as above; TiXI initializes libxml2 in its own load path.
        let library = unsafe { Library::new(&file) }.map_err(|err| TixiError::LibraryLoad {
            library: file.to_string_lossy().into_owned(),
            details: err.to_string(),
        })?;

        // Safety: the symbols are typed after the declarations in tixi.h.
        let api = unsafe { TixiApi::resolve(&library, &file)? };

        info!(library = %file.to_string_lossy(), "TiXI libraries loaded");

        Ok(NativeLibrary {
            api,
            _library: library,
            _dependencies: dependencies,
        })
    }
}

/// Library file and loader message of a failed load
type LoadFailure = (String, String);

static NATIVE_LIBRARY: OnceLock<Result<NativeLibrary, LoadFailure>> = OnceLock::new();

/// Keep the failing file and the loader's message, not the formatted error
fn remember(
    config: &LibraryConfig,
    result: TixiResult<NativeLibrary>,
) -> Result<NativeLibrary, LoadFailure> {
    result.map_err(|err| match err {
        TixiError::LibraryLoad { library, details } => (library, details),
        other => (
            config.library_file().to_string_lossy().into_owned(),
            other.to_string(),
        ),
    })
}

fn recall(loaded: &'static Result<NativeLibrary, LoadFailure>) -> TixiResult<NativeTixi> {
    match loaded {
        Ok(library) => Ok(NativeTixi { library }),
        Err((library, details)) => Err(TixiError::LibraryLoad {
            library: library.clone(),
            details: details.clone(),
        }),
    }
}

/// Load the native library for this process
///
/// The first call decides which library is loaded; later calls return the same
/// outcome regardless of `config`. A failed load is remembered as well, so it is not
/// retried.
pub fn initialize(config: &LibraryConfig) -> TixiResult<NativeTixi> {
    recall(NATIVE_LIBRARY.get_or_init(|| remember(config, NativeLibrary::load(config))))
}

/// Version string reported by the native library
pub fn version() -> TixiResult<String> {
    Ok(initialize(&LibraryConfig::default())?.version())
}

/// Copy a string owned by the native library
///
/// # Safety
///
/// `text` must be null or point to a NUL-terminated string that stays valid for the
/// duration of this call.
unsafe fn copy_native_string(text: *const c_char) -> String {
    if text.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(text) }
        .to_string_lossy()
        .into_owned()
}

fn check(code: c_int) -> NativeResult<()> {
    match StatusCode::from_code(code) {
        StatusCode::Success => Ok(()),
        status => Err(status),
    }
}

/// [`TixiBackend`] that calls into the process-wide loaded TiXI library
#[derive(Debug, Clone, Copy)]
pub struct NativeTixi {
    library: &'static NativeLibrary,
}

impl NativeTixi {
    fn api(&self) -> &TixiApi {
        &self.library.api
    }

    fn new_document(
        &self,
        create: NewDocumentFn,
        argument: &CStr,
    ) -> NativeResult<DocumentHandle> {
        let mut handle: c_int = -1;
        // Safety: `argument` is NUL-terminated and `handle` is a valid out-pointer.
        check(unsafe { create(argument.as_ptr(), &mut handle) })?;
        Ok(DocumentHandle(handle))
    }

    fn read_text(
        &self,
        call: impl FnOnce(*mut *mut c_char) -> c_int,
    ) -> NativeResult<String> {
        let mut text: *mut c_char = ptr::null_mut();
        check(call(&mut text))?;
        // Safety: on success TiXI points `text` at a string owned by the document, which
        // is still open while we hold `&DocumentHandle`.
        Ok(unsafe { copy_native_string(text) })
    }
}

impl TixiBackend for NativeTixi {
    fn version(&self) -> String {
        // Safety: tixiGetVersion returns a pointer to a static string.
        unsafe { copy_native_string((self.api().get_version)()) }
    }

    fn open_document(&self, path: &CStr, mode: OpenMode) -> NativeResult<DocumentHandle> {
        let mut handle: c_int = -1;
        // Safety: `path` is NUL-terminated and `handle` is a valid out-pointer.
        check(unsafe {
            (self.api().open_document_recursive)(path.as_ptr(), &mut handle, mode.as_raw())
        })?;
        Ok(DocumentHandle(handle))
    }

    fn import_from_string(&self, xml: &CStr) -> NativeResult<DocumentHandle> {
        self.new_document(self.api().import_from_string, xml)
    }

    fn create_document(&self, root_element_name: &CStr) -> NativeResult<DocumentHandle> {
        self.new_document(self.api().create_document, root_element_name)
    }

    fn close_document(&self, handle: DocumentHandle) -> NativeResult<()> {
        // Safety: plain integer argument.
        check(unsafe { (self.api().close_document)(handle.0) })
    }

    fn export_document_as_string(&self, handle: &DocumentHandle) -> NativeResult<String> {
        let export = self.api().export_document_as_string;
        // Safety: `out` is a valid out-pointer supplied by read_text.
        self.read_text(|out| unsafe { export(handle.0, out) })
    }

    fn add_text_element(
        &self,
        handle: &DocumentHandle,
        parent_path: &CStr,
        element_name: &CStr,
        text: &CStr,
    ) -> NativeResult<()> {
        // An empty text becomes a null pointer so TiXI creates an element without a text
        // node.
        let text = if text.is_empty() {
            ptr::null()
        } else {
            text.as_ptr()
        };
        // Safety: all pointers are NUL-terminated or null.
        check(unsafe {
            (self.api().add_text_element)(
                handle.0,
                parent_path.as_ptr(),
                element_name.as_ptr(),
                text,
            )
        })
    }

    fn add_text_attribute(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        attribute_name: &CStr,
        value: &CStr,
    ) -> NativeResult<()> {
        // Safety: all pointers are NUL-terminated.
        check(unsafe {
            (self.api().add_text_attribute)(
                handle.0,
                element_path.as_ptr(),
                attribute_name.as_ptr(),
                value.as_ptr(),
            )
        })
    }

    fn get_text_attribute(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        attribute_name: &CStr,
    ) -> NativeResult<String> {
        let get = self.api().get_text_attribute;
        // Safety: inputs are NUL-terminated, `out` is valid.
        self.read_text(|out| unsafe {
            get(handle.0, element_path.as_ptr(), attribute_name.as_ptr(), out)
        })
    }

    fn get_text_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
    ) -> NativeResult<String> {
        let get = self.api().get_text_element;
        // Safety: inputs are NUL-terminated, `out` is valid.
        self.read_text(|out| unsafe { get(handle.0, element_path.as_ptr(), out) })
    }

    fn get_double_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
    ) -> NativeResult<f64> {
        let mut number: c_double = 0.0;
        // Safety: `element_path` is NUL-terminated and `number` is a valid out-pointer.
        check(unsafe {
            (self.api().get_double_element)(handle.0, element_path.as_ptr(), &mut number)
        })?;
        Ok(number)
    }

    fn get_named_children_count(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        child_name: &CStr,
    ) -> NativeResult<i32> {
        let mut count: c_int = 0;
        // Safety: inputs are NUL-terminated and `count` is a valid out-pointer.
        check(unsafe {
            (self.api().get_named_children_count)(
                handle.0,
                element_path.as_ptr(),
                child_name.as_ptr(),
                &mut count,
            )
        })?;
        Ok(count)
    }

    fn update_text_element(
        &self,
        handle: &DocumentHandle,
        element_path: &CStr,
        text: &CStr,
    ) -> NativeResult<()> {
        // Safety: inputs are NUL-terminated.
        check(unsafe {
            (self.api().update_text_element)(handle.0, element_path.as_ptr(), text.as_ptr())
        })
    }

    fn remove_element(&self, handle: &DocumentHandle, element_path: &CStr) -> NativeResult<()> {
        // Safety: `element_path` is NUL-terminated.
        check(unsafe { (self.api().remove_element)(handle.0, element_path.as_ptr()) })
    }

    fn check_element(&self, handle: &DocumentHandle, element_path: &CStr) -> NativeResult<()> {
        // Safety: `element_path` is NUL-terminated.
        check(unsafe { (self.api().check_element)(handle.0, element_path.as_ptr()) })
    }

    fn xpath_get_text_by_index(
        &self,
        handle: &DocumentHandle,
        expression: &CStr,
        index: i32,
    ) -> NativeResult<String> {
        let get = self.api().xpath_get_text_by_index;
        // Safety: `expression` is NUL-terminated, `out` is valid.
        self.read_text(|out| unsafe { get(handle.0, expression.as_ptr(), index, out) })
    }

    fn xpath_evaluate_node_number(
        &self,
        handle: &DocumentHandle,
        expression: &CStr,
    ) -> NativeResult<i32> {
        let mut number: c_int = 0;
        // Safety: `expression` is NUL-terminated and `number` is a valid out-pointer.
        check(unsafe {
            (self.api().xpath_evaluate_node_number)(handle.0, expression.as_ptr(), &mut number)
        })?;
        Ok(number)
    }

    fn save_document(
        &self,
        handle: &DocumentHandle,
        path: &CStr,
        mode: SaveMode,
    ) -> NativeResult<()> {
        let save = match mode {
            SaveMode::Plain => self.api().save_document,
            SaveMode::Complete => self.api().save_complete_document,
            SaveMode::RemoveIncluded => self.api().save_and_remove_document,
        };
        // Safety: `path` is NUL-terminated.
        check(unsafe { save(handle.0, path.as_ptr()) })
    }

    fn schema_validate(
        &self,
        handle: &DocumentHandle,
        kind: SchemaKind,
        schema: &CStr,
    ) -> NativeResult<()> {
        let validate = match kind {
            SchemaKind::File => self.api().schema_validate_from_file,
            SchemaKind::FileWithDefaults => self.api().schema_validate_with_defaults_from_file,
            SchemaKind::String => self.api().schema_validate_from_string,
        };
        // Safety: `schema` is NUL-terminated.
        check(unsafe { validate(handle.0, schema.as_ptr()) })
    }
}
