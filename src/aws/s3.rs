use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use super::cli::AwsCli;
use crate::Result;

pub fn object_url(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key)
}

/// Read and decode a JSON object from S3 by streaming it to stdout
pub async fn get_json_file<T: DeserializeOwned>(aws: &AwsCli, bucket: &str, key: &str) -> Result<T> {
    let url = object_url(bucket, key);
    aws.run_json(&["s3", "cp", url.as_str(), "-"]).await
}

pub async fn get_file(aws: &AwsCli, bucket: &str, key: &str) -> Result<String> {
    let url = object_url(bucket, key);
    Ok(aws.process(&["s3", "cp", url.as_str(), "-"]).run().await?)
}

pub async fn put_file(aws: &AwsCli, path: &Path, bucket: &str, key: &str) -> Result<()> {
    let url = object_url(bucket, key);
    let source = path.display().to_string();
    debug!(%url, "Uploading file");
    aws.process(&["s3", "cp", source.as_str(), url.as_str()])
        .run()
        .await?;
    Ok(())
}

pub async fn delete_file(aws: &AwsCli, bucket: &str, key: &str) -> Result<()> {
    let url = object_url(bucket, key);
    aws.process(&["s3", "rm", url.as_str()]).run().await?;
    Ok(())
}

/// Names of the buckets the caller can see
pub async fn list_buckets(aws: &AwsCli) -> Result<Vec<String>> {
    let names: Option<Vec<String>> = aws
        .run_json(&["s3api", "list-buckets", "--query", "Buckets[].Name"])
        .await?;
    Ok(names.unwrap_or_default())
}

/// Every object key in `bucket`; the CLI follows pagination itself
pub async fn list_keys(aws: &AwsCli, bucket: &str) -> Result<Vec<String>> {
    // An empty bucket has no Contents, which the query turns into `null`
    let keys: Option<Vec<String>> = aws
        .run_json(&[
            "s3api",
            "list-objects-v2",
            "--bucket",
            bucket,
            "--query",
            "Contents[].Key",
        ])
        .await?;
    Ok(keys.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::cli::parse_json;

    #[test]
    fn test_object_url() {
        assert_eq!(object_url("envs", "api/prod.env"), "s3://envs/api/prod.env");
    }

    #[test]
    fn test_null_listing_is_empty() {
        let keys: Option<Vec<String>> = parse_json("null\n").unwrap();
        assert_eq!(keys.unwrap_or_default(), Vec::<String>::new());
    }
}
