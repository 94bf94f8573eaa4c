mod cli;
mod client;
pub mod ec2;
pub mod ecr;
pub mod ecs;
pub mod iam;
pub mod s3;
pub mod ssm;

pub use cli::AwsCli;
pub use client::AwsClients;
