//! Every handle a call opens is closed exactly once, whatever fails.
//!
//! A counting resource provider records opens and closes, and a
//! fault-injecting engine fails at a chosen step.

use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use xslt_bridge::{
    Config, Error, Output, ResourceProvider, StdResources, TypeMarker, XsltBridge,
};
use xslt_engine_traits::{
    EngineEnvironment, InputHandle, OutputHandle, SourceHandle, StreamResult, StreamSource,
    Transformer, TransformerFactory, XsltEngine,
};

#[derive(Debug, Default)]
struct Counts {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl Counts {
    fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct CountingInput {
    inner: Box<dyn InputHandle>,
    counts: Arc<Counts>,
}

impl Read for CountingInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl InputHandle for CountingInput {
    fn close(&mut self) -> io::Result<()> {
        self.counts.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

struct CountingOutput {
    inner: Box<dyn OutputHandle>,
    counts: Arc<Counts>,
}

impl Write for CountingOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl OutputHandle for CountingOutput {
    fn close(&mut self) -> io::Result<()> {
        self.counts.closed.fetch_add(1, Ordering::SeqCst);
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn text(&self) -> Option<io::Result<String>> {
        self.inner.text()
    }

    fn bytes(&self) -> Option<Vec<u8>> {
        self.inner.bytes()
    }
}

#[derive(Default)]
struct CountingResources {
    counts: Arc<Counts>,
}

impl CountingResources {
    fn input(&self, handle: SourceHandle) -> SourceHandle {
        let wrap = |inner| -> Box<dyn InputHandle> {
            self.counts.opened.fetch_add(1, Ordering::SeqCst);
            Box::new(CountingInput {
                inner,
                counts: Arc::clone(&self.counts),
            })
        };
        match handle {
            SourceHandle::Reader(reader) => SourceHandle::Reader(wrap(reader)),
            SourceHandle::Stream(stream) => SourceHandle::Stream(wrap(stream)),
            file => file,
        }
    }

    fn output(&self, inner: Box<dyn OutputHandle>) -> Box<dyn OutputHandle> {
        self.counts.opened.fetch_add(1, Ordering::SeqCst);
        Box::new(CountingOutput {
            inner,
            counts: Arc::clone(&self.counts),
        })
    }
}

impl ResourceProvider for CountingResources {
    fn file_reader(&self, path: &Path) -> io::Result<SourceHandle> {
        StdResources.file_reader(path)
    }

    fn string_reader(&self, text: &str) -> io::Result<SourceHandle> {
        Ok(self.input(StdResources.string_reader(text)?))
    }

    fn bytes_reader(&self, bytes: &[u8]) -> io::Result<SourceHandle> {
        Ok(self.input(StdResources.bytes_reader(bytes)?))
    }

    fn file_writer(&self, path: &Path) -> io::Result<Box<dyn OutputHandle>> {
        Ok(self.output(StdResources.file_writer(path)?))
    }

    fn string_writer(&self) -> io::Result<Box<dyn OutputHandle>> {
        Ok(self.output(StdResources.string_writer()?))
    }

    fn bytes_writer(&self) -> io::Result<Box<dyn OutputHandle>> {
        Ok(self.output(StdResources.bytes_writer()?))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fault {
    None,
    Factory,
    Compile,
    Parameter,
    Transform,
    PanicCompile,
    PanicParameter,
    PanicTransform,
}

/// Engine that copies its input and fails where it is told to
#[derive(Debug, Clone)]
struct FaultyEngine {
    fault: Fault,
    bound: Arc<Mutex<Vec<String>>>,
}

impl FaultyEngine {
    fn new(fault: Fault) -> Self {
        Self {
            fault,
            bound: Arc::default(),
        }
    }
}

fn wrapped(root: &str) -> xslt_engine_traits::Error {
    xslt_engine_traits::Error::wrap(
        "java.lang.reflect.InvocationTargetException",
        xslt_engine_traits::Error::xslt_transform(root),
    )
}

impl XsltEngine for FaultyEngine {
    type Factory = FaultyEngine;

    fn new_factory(&self, _env: &EngineEnvironment) -> xslt_engine_traits::Result<FaultyEngine> {
        if self.fault == Fault::Factory {
            return Err(wrapped("no factory"));
        }
        Ok(self.clone())
    }

    fn engine_name(&self) -> &'static str {
        "faulty"
    }

    fn xslt_version(&self) -> &'static str {
        "1.0"
    }
}

impl TransformerFactory for FaultyEngine {
    type Transformer = FaultyEngine;

    fn new_transformer(
        &self,
        stylesheet: &mut StreamSource,
    ) -> xslt_engine_traits::Result<FaultyEngine> {
        stylesheet.read_to_string()?;
        match self.fault {
            Fault::Compile => return Err(wrapped("bad stylesheet")),
            Fault::PanicCompile => panic!("compiler bug"),
            _ => {}
        }
        Ok(self.clone())
    }

    fn new_identity_transformer(&self) -> xslt_engine_traits::Result<FaultyEngine> {
        Ok(self.clone())
    }
}

impl Transformer for FaultyEngine {
    fn set_parameter(&mut self, name: &str, value: &str) -> xslt_engine_traits::Result<()> {
        if name == "fail" {
            match self.fault {
                Fault::Parameter => return Err(wrapped("bad parameter")),
                Fault::PanicParameter => panic!("binding bug"),
                _ => {}
            }
        }
        self.bound.lock().unwrap().push(format!("param {}={}", name, value));
        Ok(())
    }

    fn set_output_property(&mut self, name: &str, value: &str) -> xslt_engine_traits::Result<()> {
        self.bound.lock().unwrap().push(format!("prop {}={}", name, value));
        Ok(())
    }

    fn output_property(&self, _name: &str) -> Option<String> {
        None
    }

    fn transform(
        &mut self,
        source: &mut StreamSource,
        result: &mut StreamResult,
    ) -> xslt_engine_traits::Result<()> {
        let text = source.read_to_string()?;
        match self.fault {
            Fault::Transform => return Err(wrapped("transform failed")),
            Fault::PanicTransform => panic!("engine bug"),
            _ => {}
        }
        result.writer().write_all(text.as_bytes())?;
        Ok(())
    }
}

fn config(result: TypeMarker) -> Config {
    Config::new()
        .with_xslt("<xsl:stylesheet/>")
        .with_source(b"<order/>".to_vec())
        .with_result_type(result)
        .with_param("a", "1")
        .with_param("fail", "2")
        .with_param("c", "3")
        .with_prop("indent", "yes")
}

type Bound = Arc<Mutex<Vec<String>>>;

fn bridge(fault: Fault) -> (XsltBridge<FaultyEngine, CountingResources>, Arc<Counts>, Bound) {
    let engine = FaultyEngine::new(fault);
    let bound = Arc::clone(&engine.bound);
    let resources = CountingResources::default();
    let counts = Arc::clone(&resources.counts);
    (XsltBridge::with_parts(engine, resources), counts, bound)
}

#[test]
fn successful_call_closes_everything() {
    let (bridge, counts, bound) = bridge(Fault::None);
    let output = bridge.transform_sync(&config(TypeMarker::String)).unwrap();
    assert_eq!(output, Output::Text("<order/>".into()));
    assert_eq!(counts.opened(), 3);
    assert_eq!(counts.closed(), 3);
    assert_eq!(
        *bound.lock().unwrap(),
        vec!["param a=1", "param fail=2", "param c=3", "prop indent=yes"]
    );
}

#[test]
fn every_fault_leaves_nothing_open() {
    for fault in [Fault::Factory, Fault::Compile, Fault::Parameter, Fault::Transform] {
        let (bridge, counts, _) = bridge(fault);
        let err = bridge.transform_sync(&config(TypeMarker::Buffer)).unwrap_err();
        assert!(matches!(err, Error::Engine { .. }), "{:?}: {}", fault, err);
        assert!(!err.to_string().contains("InvocationTargetException"));
        assert_eq!(counts.opened(), counts.closed(), "{:?}", fault);
    }
}

#[test]
fn parameter_binding_stops_at_the_first_failure() {
    let (bridge, _, bound) = bridge(Fault::Parameter);
    let err = bridge.transform_sync(&config(TypeMarker::String)).unwrap_err();
    assert_eq!(err.to_string(), "XSLT transformation error: bad parameter");
    assert_eq!(*bound.lock().unwrap(), vec!["param a=1"]);
}

#[test]
fn engine_panics_close_every_handle() {
    // Only the stylesheet is open until the transformer is configured
    let faults = [
        (Fault::PanicCompile, "compiler bug", 1),
        (Fault::PanicParameter, "binding bug", 1),
        (Fault::PanicTransform, "engine bug", 3),
    ];
    for (fault, cause, opened) in faults {
        let (bridge, counts, _) = bridge(fault);
        let err = bridge.transform_sync(&config(TypeMarker::String)).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)), "{:?}: {}", fault, err);
        assert!(err.to_string().contains("panicked"), "{}", err);
        assert!(err.to_string().ends_with(cause), "{}", err);
        assert_eq!(counts.opened(), opened, "{:?}", fault);
        assert_eq!(counts.closed(), opened, "{:?}", fault);
    }
}

#[test]
fn panic_with_a_file_result_still_closes_it() {
    let dir = tempfile::tempdir().unwrap();
    let (bridge, counts, _) = bridge(Fault::PanicTransform);
    let config = config(TypeMarker::String).with_result_path(dir.path().join("out.xml"));
    assert!(matches!(bridge.transform_sync(&config), Err(Error::Runtime(_))));
    assert_eq!(counts.opened(), 3);
    assert_eq!(counts.closed(), 3);
}

#[test]
fn invalid_configuration_opens_nothing() {
    let (bridge, counts, _) = bridge(Fault::None);
    let config = config(TypeMarker::String).with_source_path("order.xml");
    assert!(bridge.transform_sync(&config).unwrap_err().is_configuration());
    assert_eq!(counts.opened(), 0);
    assert_eq!(counts.closed(), 0);
}

#[test]
fn unwritable_result_file_still_closes_the_sources() {
    let (bridge, counts, _) = bridge(Fault::None);
    let config = Config::new()
        .with_xslt("<xsl:stylesheet/>")
        .with_source("<order/>")
        .with_result_path("/no/such/dir/out.xml");
    let err = bridge.transform_sync(&config).unwrap_err();
    assert!(matches!(err, Error::Resource(_)));
    assert_eq!(counts.opened(), counts.closed());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_are_independent_and_clean() {
    let (bridge, counts, _) = bridge(Fault::None);
    let calls = (0..8).map(|i| {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            let config = Config::new()
                .with_source(format!("<n>{}</n>", i))
                .with_result_type(TypeMarker::String);
            bridge.transform_async(&config).await
        })
    });
    for (i, call) in calls.collect::<Vec<_>>().into_iter().enumerate() {
        let output = call.await.unwrap().unwrap();
        assert_eq!(output.as_text(), Some(format!("<n>{}</n>", i).as_str()));
    }
    assert_eq!(counts.opened(), 16);
    assert_eq!(counts.closed(), 16);
}

#[tokio::test]
async fn async_faults_leave_nothing_open() {
    let faults = [
        Fault::Factory,
        Fault::Compile,
        Fault::Parameter,
        Fault::Transform,
        Fault::PanicCompile,
        Fault::PanicParameter,
        Fault::PanicTransform,
    ];
    for fault in faults {
        let (bridge, counts, _) = bridge(fault);
        assert!(bridge.transform_async(&config(TypeMarker::String)).await.is_err());
        assert_eq!(counts.opened(), counts.closed(), "{:?}", fault);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_parameter_binding_stops_at_the_first_failure() {
    let (bridge, counts, bound) = bridge(Fault::Parameter);
    let err = bridge
        .transform_async(&config(TypeMarker::String))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "XSLT transformation error: bad parameter");
    assert_eq!(*bound.lock().unwrap(), vec!["param a=1"]);
    assert_eq!(counts.opened(), counts.closed());
}

#[tokio::test]
async fn async_panics_are_reported_as_runtime_errors() {
    let (bridge, counts, _) = bridge(Fault::PanicTransform);
    let err = bridge
        .transform_async(&config(TypeMarker::Buffer))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Runtime(_)), "{}", err);
    assert!(err.to_string().contains("engine bug"));
    assert_eq!(counts.opened(), 3);
    assert_eq!(counts.closed(), 3);
}
