//! API Gateway V2 (HTTP API) constructs for queuetester
//!
//! An [`HttpApi`] owns its `$default` stage; routes are added with
//! [`HttpApi::add_routes`] and proxy to a Lambda function through an
//! [`HttpLambdaIntegration`].

mod api;
mod route;

pub use api::{HttpApi, HttpApiProps};
pub use route::{
    AddRoutesOptions, HttpLambdaIntegration, HttpMethod, HttpRoute, PayloadFormatVersion,
};
