//! Transformation pipeline: steps, their shared state and cleanup
//!
//! Every step takes what it needs out of the shared [`Slots`], works without
//! holding the lock, and puts everything back before returning, so that
//! cleanup sees each handle that was ever produced.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use xslt_engine_traits::{
    EngineEnvironment, OutputHandle, SourceHandle, StreamResult, StreamSource, Transformer,
    TransformerFactory, XsltEngine,
};

use crate::error::{Error, Result};
use crate::graph::TaskGraph;
use crate::resource::ResourceProvider;
use crate::validate::{Plan, ResultTarget};

/// A named pipeline step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    XsltSource,
    XsltStreamSource,
    Source,
    StreamSource,
    Result,
    StreamResult,
    Factory,
    Transformer,
    Params,
    Props,
    Transform,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Step::XsltSource => "xsltSource",
            Step::XsltStreamSource => "xsltStreamSource",
            Step::Source => "source",
            Step::StreamSource => "streamSource",
            Step::Result => "result",
            Step::StreamResult => "streamResult",
            Step::Factory => "factory",
            Step::Transformer => "transformer",
            Step::Params => "params",
            Step::Props => "props",
            Step::Transform => "transform",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The value a successful transform produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    /// The result went to a file
    Written,
    Text(String),
    Buffer(Vec<u8>),
}

impl Output {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Output::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Output::Text(text) => Some(text.as_bytes()),
            Output::Buffer(bytes) => Some(bytes),
            Output::Written => None,
        }
    }
}

type FactoryOf<E> = <E as XsltEngine>::Factory;
type TransformerOf<E> = <FactoryOf<E> as TransformerFactory>::Transformer;

/// Everything a call has produced so far
struct Slots<F, T> {
    xslt_source: Option<SourceHandle>,
    xslt_stream: Option<StreamSource>,
    source: Option<SourceHandle>,
    stream_source: Option<StreamSource>,
    result: Option<Box<dyn OutputHandle>>,
    stream_result: Option<StreamResult>,
    factory: Option<F>,
    transformer: Option<T>,
}

impl<F, T> Default for Slots<F, T> {
    fn default() -> Self {
        Self {
            xslt_source: None,
            xslt_stream: None,
            source: None,
            stream_source: None,
            result: None,
            stream_result: None,
            factory: None,
            transformer: None,
        }
    }
}

/// State of one transform call. Never shared between calls.
pub struct Pipeline<E: XsltEngine, R> {
    engine: Arc<E>,
    resources: Arc<R>,
    environment: EngineEnvironment,
    plan: Plan,
    params: Option<IndexMap<String, String>>,
    props: Option<IndexMap<String, String>>,
    slots: Mutex<Slots<FactoryOf<E>, TransformerOf<E>>>,
}

impl<E, R> Pipeline<E, R>
where
    E: XsltEngine,
    R: ResourceProvider,
{
    pub fn new(
        engine: Arc<E>,
        resources: Arc<R>,
        environment: EngineEnvironment,
        plan: Plan,
        params: Option<IndexMap<String, String>>,
        props: Option<IndexMap<String, String>>,
    ) -> Self {
        Self {
            engine,
            resources,
            environment,
            plan,
            params,
            props,
            slots: Mutex::new(Slots::default()),
        }
    }

    /// The steps of this call and what each one waits for.
    ///
    /// The transformer and its bindings come first so a stylesheet that
    /// fails to compile never opens, and so never truncates, a result file.
    pub fn graph(&self) -> TaskGraph<Step> {
        let mut graph = TaskGraph::new();
        graph.add(Step::Factory, []);
        if self.plan.stylesheet.is_some() {
            graph
                .add(Step::XsltSource, [])
                .add(Step::XsltStreamSource, [Step::XsltSource])
                .add(Step::Transformer, [Step::Factory, Step::XsltStreamSource]);
        } else {
            graph.add(Step::Transformer, [Step::Factory]);
        }

        let mut transform = vec![Step::Transformer, Step::StreamSource, Step::StreamResult];
        if self.params.is_some() {
            graph.add(Step::Params, [Step::Transformer]);
            transform.push(Step::Params);
        }
        if self.props.is_some() {
            graph.add(Step::Props, [Step::Transformer]);
            if self.params.is_some() {
                graph.depend(Step::Props, Step::Params);
            }
            transform.push(Step::Props);
        }

        graph
            .add(Step::Source, [])
            .add(Step::StreamSource, [Step::Source])
            .add(Step::Result, [])
            .add(Step::StreamResult, [Step::Result])
            .add(Step::Transform, transform);
        graph
    }

    fn slots(&self) -> Result<MutexGuard<'_, Slots<FactoryOf<E>, TransformerOf<E>>>> {
        self.slots
            .lock()
            .map_err(|_| Error::Runtime("pipeline state is poisoned".to_string()))
    }

    fn missing(step: Step, what: &str) -> Error {
        Error::Runtime(format!("step '{}' ran without its {}", step, what))
    }

    /// Run a single step. Its dependencies must have succeeded.
    ///
    /// A panic inside the step is reported as [`Error::Runtime`].
    pub fn run_step(&self, step: Step) -> Result<()> {
        guarded(step, || self.dispatch(step))
    }

    fn dispatch(&self, step: Step) -> Result<()> {
        match step {
            Step::XsltSource => {
                let input = self
                    .plan
                    .stylesheet
                    .as_ref()
                    .ok_or_else(|| Self::missing(step, "stylesheet"))?;
                let handle = self.resources.open(input)?;
                self.slots()?.xslt_source = Some(handle);
            }
            Step::XsltStreamSource => {
                let mut slots = self.slots()?;
                let handle = slots
                    .xslt_source
                    .take()
                    .ok_or_else(|| Self::missing(step, "stylesheet"))?;
                slots.xslt_stream = Some(StreamSource::new(handle));
            }
            Step::Source => {
                let handle = self.resources.open(&self.plan.source)?;
                self.slots()?.source = Some(handle);
            }
            Step::StreamSource => {
                let mut slots = self.slots()?;
                let handle = slots.source.take().ok_or_else(|| Self::missing(step, "source"))?;
                slots.stream_source = Some(StreamSource::new(handle));
            }
            Step::Result => {
                let sink = match &self.plan.result {
                    ResultTarget::File(path) => self.resources.file_writer(path)?,
                    ResultTarget::Text => self.resources.string_writer()?,
                    ResultTarget::Buffer => self.resources.bytes_writer()?,
                };
                self.slots()?.result = Some(sink);
            }
            Step::StreamResult => {
                let mut slots = self.slots()?;
                let sink = slots.result.take().ok_or_else(|| Self::missing(step, "result"))?;
                slots.stream_result = Some(StreamResult::new(sink));
            }
            Step::Factory => {
                let factory = self.engine.new_factory(&self.environment)?;
                self.slots()?.factory = Some(factory);
            }
            Step::Transformer => self.build_transformer()?,
            Step::Params => {
                if let Some(params) = &self.params {
                    self.bind(step, params, |t, name, value| t.set_parameter(name, value))?;
                }
            }
            Step::Props => {
                if let Some(props) = &self.props {
                    self.bind(step, props, |t, name, value| t.set_output_property(name, value))?;
                }
            }
            Step::Transform => self.execute()?,
        }
        Ok(())
    }

    fn build_transformer(&self) -> Result<()> {
        let (factory, mut stylesheet) = {
            let mut slots = self.slots()?;
            let factory = slots
                .factory
                .take()
                .ok_or_else(|| Self::missing(Step::Transformer, "factory"))?;
            (factory, slots.xslt_stream.take())
        };

        let built = guarded(Step::Transformer, || {
            Ok(match stylesheet.as_mut() {
                Some(stream) => factory.new_transformer(stream)?,
                None => factory.new_identity_transformer()?,
            })
        });

        let mut slots = self.slots()?;
        slots.factory = Some(factory);
        slots.xslt_stream = stylesheet;
        slots.transformer = Some(built?);
        Ok(())
    }

    /// Bind `values` one after another, in insertion order.
    fn bind<B>(&self, step: Step, values: &IndexMap<String, String>, mut setter: B) -> Result<()>
    where
        B: FnMut(&mut TransformerOf<E>, &str, &str) -> xslt_engine_traits::Result<()>,
    {
        let mut transformer = self
            .slots()?
            .transformer
            .take()
            .ok_or_else(|| Self::missing(step, "transformer"))?;

        let outcome = guarded(step, || {
            for (name, value) in values {
                setter(&mut transformer, name, value)?;
            }
            Ok(())
        });

        self.slots()?.transformer = Some(transformer);
        outcome
    }

    fn execute(&self) -> Result<()> {
        let (mut transformer, mut source, mut result) = {
            let mut slots = self.slots()?;
            let parts = (
                slots.transformer.take(),
                slots.stream_source.take(),
                slots.stream_result.take(),
            );
            match parts {
                (Some(t), Some(s), Some(r)) => (t, s, r),
                (t, s, r) => {
                    slots.transformer = t;
                    slots.stream_source = s;
                    slots.stream_result = r;
                    return Err(Self::missing(Step::Transform, "inputs"));
                }
            }
        };

        let outcome = guarded(Step::Transform, || {
            Ok(transformer.transform(&mut source, &mut result)?)
        });

        let mut slots = self.slots()?;
        slots.transformer = Some(transformer);
        slots.stream_source = Some(source);
        slots.stream_result = Some(result);
        outcome
    }

    /// Close every opened handle exactly once and produce the call's outcome.
    ///
    /// On failure of the steps their error is returned and close failures
    /// are only logged. Otherwise a close failure fails the call.
    pub fn finish(&self, outcome: Result<()>) -> Result<Output> {
        let (sink, close_error) = self.close_all()?;

        if let Err(e) = outcome {
            if let Some(close_error) = close_error {
                log::warn!("closing resources after a failed transform: {}", close_error);
            }
            return Err(e);
        }
        if let Some(close_error) = close_error {
            return Err(Error::Resource(close_error));
        }

        match (&self.plan.result, sink) {
            (ResultTarget::File(_), _) => Ok(Output::Written),
            (ResultTarget::Text, Some(sink)) => match sink.text() {
                Some(text) => Ok(Output::Text(text?)),
                None => Err(Error::Runtime("result sink holds no text".to_string())),
            },
            (ResultTarget::Buffer, Some(sink)) => sink
                .bytes()
                .map(Output::Buffer)
                .ok_or_else(|| Error::Runtime("result sink holds no bytes".to_string())),
            (_, None) => Err(Error::Runtime("no result was produced".to_string())),
        }
    }

    /// Take every handle out of the slots and close it.
    fn close_all(&self) -> Result<(Option<Box<dyn OutputHandle>>, Option<io::Error>)> {
        let (xslt, source, sink) = {
            let mut slots = self.slots()?;
            let xslt = close_source(slots.xslt_stream.take(), slots.xslt_source.take());
            let source = close_source(slots.stream_source.take(), slots.source.take());
            let sink = slots
                .stream_result
                .take()
                .map(StreamResult::into_handle)
                .or_else(|| slots.result.take());
            (xslt, source, sink)
        };

        let mut first_error = None;
        for closed in [xslt, source] {
            if let Err(e) = closed {
                first_error.get_or_insert(e);
            }
        }

        let sink = sink.map(|mut sink| {
            if let Err(e) = sink.close() {
                first_error.get_or_insert(e);
            }
            sink
        });

        Ok((sink, first_error))
    }
}

/// Run `call`, turning a panic into an error so the caller can still put
/// back the handles it took out of the slots.
fn guarded<T>(step: Step, call: impl FnOnce() -> Result<T>) -> Result<T> {
    panic::catch_unwind(AssertUnwindSafe(call)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("unknown cause");
        Err(Error::Runtime(format!("step '{}' panicked: {}", step, message)))
    })
}

/// Close a source through its stream wrapper if one was built.
fn close_source(stream: Option<StreamSource>, raw: Option<SourceHandle>) -> io::Result<()> {
    match (stream, raw) {
        (Some(mut stream), _) => stream.close(),
        (None, Some(mut raw)) => raw.close(),
        (None, None) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::StdResources;
    use crate::validate::Input;
    use xrust_adapter::XrustEngine;

    fn pipeline(
        stylesheet: Option<Input>,
        params: bool,
        props: bool,
    ) -> Pipeline<XrustEngine, StdResources> {
        let plan = Plan {
            stylesheet,
            source: Input::Text("<order/>".into()),
            result: ResultTarget::Text,
        };
        let map = || Some(IndexMap::from([("a".to_string(), "1".to_string())]));
        Pipeline::new(
            Arc::new(XrustEngine::new()),
            Arc::new(StdResources),
            EngineEnvironment::default(),
            plan,
            if params { map() } else { None },
            if props { map() } else { None },
        )
    }

    #[test]
    fn identity_graph_has_no_stylesheet_steps() {
        let graph = pipeline(None, false, false).graph();
        assert!(!graph.contains(Step::XsltSource));
        assert_eq!(graph.dependencies(Step::Transformer), &[Step::Factory]);
        assert_eq!(graph.len(), 7);
    }

    #[test]
    fn stylesheet_and_bindings_extend_the_graph() {
        let graph = pipeline(Some(Input::Text("<x/>".into())), true, true).graph();
        assert_eq!(
            graph.dependencies(Step::Transformer),
            &[Step::Factory, Step::XsltStreamSource]
        );
        assert_eq!(graph.dependencies(Step::Props), &[Step::Transformer, Step::Params]);
        assert_eq!(
            graph.dependencies(Step::Transform),
            &[Step::Transformer, Step::StreamSource, Step::StreamResult, Step::Params, Step::Props]
        );
        assert_eq!(
            graph.order().unwrap(),
            vec![
                Step::Factory,
                Step::XsltSource,
                Step::XsltStreamSource,
                Step::Transformer,
                Step::Params,
                Step::Props,
                Step::Source,
                Step::StreamSource,
                Step::Result,
                Step::StreamResult,
                Step::Transform,
            ]
        );
    }

    #[test]
    fn finish_without_steps_closes_nothing_and_keeps_the_error() {
        let pipeline = pipeline(None, false, false);
        let err = pipeline.finish(Err(Error::Runtime("boom".into()))).unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn identity_pipeline_runs_sequentially() {
        let pipeline = pipeline(None, false, false);
        let graph = pipeline.graph();
        let outcome = crate::graph::run_sequential(&graph, |step| pipeline.run_step(step));
        let output = pipeline.finish(outcome).unwrap();
        let text = output.as_text().unwrap();
        assert!(text.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?><order"#));
    }
}
