pub mod assume_role;
pub mod completions;
pub mod config;
pub mod deploy_update;
pub mod docker_build;
pub mod docker_exec;
pub mod docker_login;
pub mod docker_push;
pub mod ec2_list;
pub mod ecs_connect;
pub mod manage_env;
pub mod mfa_login;
pub mod ssm_connect;
pub mod ssm_copy;
pub mod ssm_send_ssh_key;
pub mod ssm_start_session;
