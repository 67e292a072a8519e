//! CircleCI status through the Gerrit CircleCI plugin

use gerrit_core::Error as CoreError;
use gerrit_core::executor::get_args;
use gerrit_core::extract::{display_value, render_ci_status};
use serde_json::Value;

use super::{change_url, encode, parse_array, parse_json, recover_with, str_or};
use crate::Result;
use crate::context::Context;
use crate::operations::ChangeArgs;

const PLUGIN_HINT: &str = "The CircleCI plugin may not be installed on this Gerrit instance.";

/// The plugin endpoint is missing when the request failed with a 404.
fn is_not_found(err: &CoreError) -> bool {
    matches!(err, CoreError::Transport { .. }) && err.to_string().contains("404")
}

pub async fn get_circleci_status(ctx: &Context, args: ChangeArgs) -> Result<String> {
    let base_url = ctx.base_url(args.gerrit_base_url.as_deref())?;
    let id = &args.change_id;

    // The plugin is keyed by the full Change-Id, branch and project.
    let detail_url = change_url(&base_url, id, "");
    let details = match ctx.fetch(&get_args(&detail_url), &base_url).await {
        Ok(body) => parse_json(&body),
        Err(err) => Err(err),
    };
    let details = match details {
        Ok(details) => details,
        Err(err) => {
            return recover_with(err, |e| {
                format!("Failed to fetch change details for CL {id}: {e}")
            });
        }
    };

    let cl_number = match details.get("_number") {
        Some(number) if !number.is_null() => display_value(Some(number)),
        _ => id.clone(),
    };
    let status_url = format!(
        "{base_url}/plugins/circleci/status?changeId={}&branch={}&project={}",
        encode(str_or(&details, "change_id", "")),
        encode(str_or(&details, "branch", "")),
        encode(str_or(&details, "project", "")),
    );

    let body = match ctx.fetch(&get_args(&status_url), &base_url).await {
        Ok(body) => body,
        Err(err) if err.is_config() => return Err(err.into()),
        Err(err) if is_not_found(&err) => {
            return Ok(format!(
                "No CircleCI status endpoint found for CL {cl_number}. {PLUGIN_HINT}"
            ));
        }
        Err(err) => {
            ctx.note(&format!(
                "Error fetching CircleCI status for CL {cl_number}: {err}"
            ));
            return Err(err.into());
        }
    };

    let workflows: Vec<Value> = match parse_array(&body) {
        Ok(workflows) => workflows,
        Err(_) => {
            return Ok(format!(
                "Failed to parse CircleCI status response for CL {cl_number}. {PLUGIN_HINT}"
            ));
        }
    };

    Ok(render_ci_status(&cl_number, &workflows))
}
