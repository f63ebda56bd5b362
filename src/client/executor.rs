//! Operation execution: spec + arguments in, response or byte stream out.

use crate::client::http::HttpClient;
use crate::protocol::OperationSpec;
use crate::request::{build_body, build_files, build_path, build_query, CallRequest};
use crate::types::{Arguments, ResponseBody};
use crate::{BoxStream, Error, ErrorContext, Result};
use bytes::Bytes;
use tracing::debug;

/// Result of executing an operation.
pub enum Execution {
    Response(ResponseBody),
    Stream(BoxStream<'static, Bytes>),
}

impl Execution {
    pub fn is_stream(&self) -> bool {
        matches!(self, Execution::Stream(_))
    }

    pub fn into_response(self) -> Result<ResponseBody> {
        match self {
            Execution::Response(body) => Ok(body),
            Execution::Stream(_) => Err(Error::validation(
                "operation streams its response; consume it with into_stream()",
            )),
        }
    }

    pub fn into_stream(self) -> Result<BoxStream<'static, Bytes>> {
        match self {
            Execution::Stream(stream) => Ok(stream),
            Execution::Response(_) => Err(Error::validation(
                "operation returns a buffered response; use into_response()",
            )),
        }
    }
}

impl std::fmt::Debug for Execution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Execution::Response(body) => f.debug_tuple("Response").field(body).finish(),
            Execution::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Runs operation specs against an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    http: HttpClient,
}

impl OperationExecutor {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Assemble the call without sending it.
    pub fn resolve(spec: &OperationSpec, args: Arguments) -> Result<CallRequest> {
        let args = apply_declarations(spec, args)?;
        let request = &spec.request;
        let options = args.request_options().clone();

        Ok(CallRequest {
            method: request.method.clone(),
            path: build_path(&request.path, &args)?,
            query: build_query(&request.query, &args, &options)?,
            json: build_body(request.json.as_ref(), &args, &options)?,
            form: build_body(request.form.as_ref(), &args, &options)?,
            files: build_files(&request.files, &args),
            headers: request.headers.clone(),
            request_options: options,
            force_multipart: request.force_multipart,
        })
    }

    /// Resolve and dispatch: streaming operations return a lazy stream,
    /// everything else is sent and decoded before returning.
    pub async fn execute(&self, spec: &OperationSpec, args: Arguments) -> Result<Execution> {
        let call = Self::resolve(spec, args)?;
        debug!(
            operation = spec.name.as_str(),
            http_method = call.method.as_str(),
            path = call.path.as_str(),
            streaming = spec.request.streaming,
            "dispatching operation"
        );
        if spec.request.streaming {
            Ok(Execution::Stream(self.http.stream(call)))
        } else {
            Ok(Execution::Response(self.http.request(call).await?))
        }
    }
}

/// Fill literal defaults, enforce required positionals, reject unknown names.
///
/// Operations that declare no parameters accept any argument.
fn apply_declarations(spec: &OperationSpec, mut args: Arguments) -> Result<Arguments> {
    if spec.positional_params.is_empty() && spec.keyword_params.is_empty() {
        return Ok(args);
    }

    if let Some(unknown) = args
        .names()
        .find(|name| !spec.declared_params().any(|p| p.name == *name))
    {
        return Err(Error::validation_with_context(
            format!("unexpected argument '{}' for operation '{}'", unknown, spec.name),
            ErrorContext::new()
                .with_field_path(unknown)
                .with_source("operation_executor"),
        ));
    }

    for decl in &spec.positional_params {
        if args.contains(&decl.name) {
            continue;
        }
        match decl.default_arg() {
            Some(default) => args.set(decl.name.clone(), default),
            None if !decl.has_default() => return Err(Error::missing_parameter(decl.name.as_str())),
            None => {}
        }
    }

    for decl in &spec.keyword_params {
        if !args.contains(&decl.name) {
            if let Some(default) = decl.default_arg() {
                args.set(decl.name.clone(), default);
            }
        }
    }
    Ok(args)
}
