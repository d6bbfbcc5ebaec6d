//! Presigned source-region requests for cross-region copies
//!
//! A cross-region `CopyDBClusterSnapshot` of an encrypted snapshot is only
//! accepted with `PreSignedUrl`: the same copy call, signed with SigV4 query
//! parameters against the source region's endpoint.

use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    SignableBody, SignableRequest, SignatureLocation, SigningParams, SigningSettings, sign,
};
use aws_sigv4::sign::v4;
use url::Url;

use super::types::CopySnapshotRequest;

const SERVICE: &str = "rds";
const API_VERSION: &str = "2014-10-31";
const EXPIRES_IN: Duration = Duration::from_secs(3600);

/// Region the copy has to be presigned for, if any
///
/// Only copies whose source lives in a different region need a URL.
pub fn presign_region<'a>(request: &'a CopySnapshotRequest, region: &str) -> Option<&'a str> {
    request
        .source_region
        .as_deref()
        .filter(|source| *source != region)
}

fn endpoint(region: &str) -> String {
    let suffix = if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    };
    format!("https://{SERVICE}.{region}.{suffix}/")
}

/// Build the presigned `CopyDBClusterSnapshot` URL for `source_region`
pub fn presigned_copy_url(
    request: &CopySnapshotRequest,
    source_region: &str,
    destination_region: &str,
    credentials: Credentials,
    time: SystemTime,
) -> Result<String> {
    let mut query = vec![
        ("Action", "CopyDBClusterSnapshot"),
        ("Version", API_VERSION),
        ("SourceDBClusterSnapshotIdentifier", request.source.as_str()),
        ("TargetDBClusterSnapshotIdentifier", request.target_identifier.as_str()),
        ("DestinationRegion", destination_region),
    ];
    if let Some(key) = request.kms_key_id.as_deref() {
        query.push(("KmsKeyId", key));
    }
    let mut url = Url::parse_with_params(&endpoint(source_region), &query)
        .context("Failed to build presign URL")?;

    let mut settings = SigningSettings::default();
    settings.signature_location = SignatureLocation::QueryParams;
    settings.expires_in = Some(EXPIRES_IN);

    let identity = credentials.into();
    let params: SigningParams<'_> = v4::SigningParams::builder()
        .identity(&identity)
        .region(source_region)
        .name(SERVICE)
        .time(time)
        .settings(settings)
        .build()
        .context("Invalid signing parameters")?
        .into();

    let signable = SignableRequest::new(
        "GET",
        url.as_str(),
        std::iter::empty(),
        SignableBody::Bytes(&[]),
    )
    .context("Failed to prepare presign request")?;
    let (instructions, _signature) = sign(signable, &params)
        .context("Failed to presign copy request")?
        .into_parts();

    let (_headers, signed) = instructions.into_parts();
    url.query_pairs_mut().extend_pairs(signed);
    Ok(url.into())
}
