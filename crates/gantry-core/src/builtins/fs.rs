use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

use crate::models::{CoreError, CoreResult, ParamKind, ParamSpec};
use crate::registry::{SearchRoot, TaskManifest, TaskUnit};
use crate::task::{TaskArgs, TaskBehavior, TaskCall, TaskTest, VerifyOutcome};

pub(crate) fn register(root: &mut SearchRoot) -> CoreResult<()> {
    root.register("fs.read", read_unit)?;
    root.register("fs.write", write_unit)?;
    root.register("fs.digests.md5", md5_unit)?;
    Ok(())
}

fn read_unit() -> TaskUnit {
    TaskUnit::new().task(TaskManifest::new(
        "Reads a file and returns its contents as base64 text.",
        vec![ParamSpec::new(
            "path",
            ParamKind::Str,
            "The path of the file to read",
        )],
        Arc::new(FsRead),
    ))
}

struct FsRead;

#[async_trait(?Send)]
impl TaskBehavior for FsRead {
    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value> {
        let path = call.params().str("path")?;
        let content = call.read(path).await?;
        Ok(Value::String(STANDARD.encode(content)))
    }
}

fn write_unit() -> TaskUnit {
    TaskUnit::new().task(TaskManifest::new(
        "Writes base64-encoded content to a file, skipping the write when \
         the file already holds it.",
        vec![
            ParamSpec::new("path", ParamKind::Str, "The path of the file to write"),
            ParamSpec::new(
                "content",
                ParamKind::Str,
                "The content to write, base64-encoded",
            ),
        ],
        Arc::new(FsWrite),
    ))
}

struct FsWrite;

#[async_trait(?Send)]
impl TaskBehavior for FsWrite {
    async fn verify(&self, call: &mut TaskCall) -> CoreResult<VerifyOutcome> {
        let path = call.params().str("path")?;
        let expected = decode_content(call.params().str("content")?)?;
        let actual = call.read(path).await?;
        if actual == expected {
            Ok(VerifyOutcome::Satisfied)
        } else {
            Err(CoreError::task(format!(
                "'{path}' does not hold the expected content"
            )))
        }
    }

    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value> {
        let content = decode_content(call.params().str("content")?)?;
        let path = call.params().str("path")?;
        call.write(path, &content).await?;
        Ok(Value::Null)
    }
}

fn decode_content(text: &str) -> CoreResult<Vec<u8>> {
    STANDARD
        .decode(text)
        .map_err(|error| CoreError::task(format!("content is not valid base64: {error}")))
}

fn md5_unit() -> TaskUnit {
    TaskUnit::new()
        .task(TaskManifest::new(
            "Computes the md5 digest of a file.",
            vec![ParamSpec::new(
                "path",
                ParamKind::Str,
                "The path of the file to digest",
            )],
            Arc::new(Md5Digest),
        ))
        .test(TaskTest::new(
            "digests_known_payload",
            Arc::new(Md5DigestTest),
        ))
}

struct Md5Digest;

#[async_trait(?Send)]
impl TaskBehavior for Md5Digest {
    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value> {
        let path = call.params().esc("path")?;
        let stdout = call.sh(&format!("md5sum {path}")).await?;
        let digest = stdout
            .split_whitespace()
            .next()
            .ok_or_else(|| CoreError::task("md5sum produced no output"))?;
        Ok(Value::String(digest.to_string()))
    }
}

struct Md5DigestTest;

#[async_trait(?Send)]
impl TaskBehavior for Md5DigestTest {
    async fn run(&self, call: &mut TaskCall) -> CoreResult<Value> {
        let path = "/tmp/gantry_md5_check";
        call.write(path, b"hello world\n").await?;
        let digest = call
            .tasks()
            .segment("fs")
            .segment("digests")
            .segment("md5")
            .call(TaskArgs::new().arg(path))
            .await?;
        call.sh(&format!("rm -f {}", call.esc(path)?)).await?;

        if digest == Value::String("6f5902ac237024bdd0c176cb93063dc4".to_string()) {
            Ok(Value::Null)
        } else {
            Err(CoreError::task(format!("unexpected digest {digest}")))
        }
    }
}
