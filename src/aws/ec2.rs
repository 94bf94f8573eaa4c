use serde::Deserialize;

use super::cli::AwsCli;
use crate::Result;

/// JMESPath projection keeping just what the listing shows
const INSTANCE_QUERY: &str = "Reservations[*].Instances[*].{InstanceId:InstanceId,Name:Tags[?Key=='Name']|[0].Value,PrivateIpAddress:PrivateIpAddress,InstanceType:InstanceType}";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InstanceSummary {
    pub instance_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub private_ip_address: Option<String>,
    #[serde(default)]
    pub instance_type: Option<String>,
}

impl InstanceSummary {
    /// One-line description used in the instance picker
    pub fn label(&self) -> String {
        format!(
            "[{}] {} - {} {}",
            self.instance_id,
            self.name.as_deref().unwrap_or("(unnamed)"),
            self.private_ip_address.as_deref().unwrap_or("-"),
            self.instance_type.as_deref().unwrap_or("-")
        )
    }
}

/// List instances in the configured account and region
pub async fn list_instances(aws: &AwsCli) -> Result<Vec<InstanceSummary>> {
    let query = format!("--query={}", INSTANCE_QUERY);
    let reservations: Vec<Vec<InstanceSummary>> = aws
        .run_json(&["ec2", "describe-instances", query.as_str()])
        .await?;

    Ok(reservations.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::cli::parse_json;

    #[test]
    fn test_parse_describe_output() {
        let output = r#"[
            [
                {"InstanceId": "i-0abc", "Name": "web-1", "PrivateIpAddress": "10.0.1.5", "InstanceType": "t3.small"}
            ],
            [
                {"InstanceId": "i-0def", "Name": null, "PrivateIpAddress": "10.0.2.9", "InstanceType": "t3.large"},
                {"InstanceId": "i-0fed", "Name": "worker", "PrivateIpAddress": null, "InstanceType": "m5.large"}
            ]
        ]"#;

        let reservations: Vec<Vec<InstanceSummary>> = parse_json(output).unwrap();
        let instances: Vec<InstanceSummary> = reservations.into_iter().flatten().collect();

        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].label(), "[i-0abc] web-1 - 10.0.1.5 t3.small");
        assert_eq!(instances[1].name, None);
        assert_eq!(instances[1].label(), "[i-0def] (unnamed) - 10.0.2.9 t3.large");
        assert_eq!(instances[2].private_ip_address, None);
    }
}
