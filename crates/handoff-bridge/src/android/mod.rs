// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Android platform bridge via JNI.
//
// Requires the Android NDK and targets `aarch64-linux-android` or
// `armv7-linux-androideabi`. Shared files arrive as `content://` URIs that the
// Dart/Rust file APIs cannot read directly, so every read goes through
// `ContentResolver.openInputStream`.
//
// ## Architecture notes
//
// The host Activity forwards both the launch Intent (from `onCreate` /
// `configureFlutterEngine`) and later Intents (from `onNewIntent`) to the
// intake. [`reference_from_intent`] normalises the two physical shapes:
// `ACTION_VIEW` carries the URI in `getData()`, `ACTION_SEND` carries it in
// the `EXTRA_STREAM` parcelable.

#![cfg(target_os = "android")]

use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::OnceLock;

use jni::objects::{JByteArray, JObject, JString, JValue};
use jni::sys::jbyte;
use jni::{JNIEnv, JavaVM};

use handoff_core::{Arrival, DeliveryEvent, FileReference, HandoffError, IntakeAction, Result};

use crate::traits::*;

/// `OpenableColumns.DISPLAY_NAME`.
const DISPLAY_NAME_COLUMN: &str = "_display_name";

/// `Intent.EXTRA_STREAM`.
const EXTRA_STREAM: &str = "android.intent.extra.STREAM";

/// Bytes pulled across JNI per `InputStream.read` call.
const READ_CHUNK: i32 = 8192;

// ---------------------------------------------------------------------------
// JNI bootstrap helpers
// ---------------------------------------------------------------------------

static JAVA_VM: OnceLock<JavaVM> = OnceLock::new();

/// Resolve the process `JavaVM` from the NDK context, once.
fn java_vm() -> Result<&'static JavaVM> {
    if let Some(vm) = JAVA_VM.get() {
        return Ok(vm);
    }
    let ctx = ndk_context::android_context();
    // SAFETY: `ctx.vm()` returns the `JavaVM*` set by the NDK glue code.
    // The pointer is guaranteed valid for the lifetime of the process.
    let vm = unsafe { JavaVM::from_raw(ctx.vm().cast()) }
        .map_err(|e| HandoffError::Bridge(format!("failed to obtain JavaVM: {e}")))?;
    Ok(JAVA_VM.get_or_init(|| vm))
}

/// Obtain a [`JNIEnv`] for the current thread, attaching it if needed.
fn jni_env() -> Result<JNIEnv<'static>> {
    java_vm()?
        .attach_current_thread_permanently()
        .map_err(|e| HandoffError::Bridge(format!("failed to attach JNI thread: {e}")))
}

/// Obtain the hosting Android `Activity` as a [`JObject`].
fn activity() -> Result<JObject<'static>> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(HandoffError::Bridge(
            "Android context is null — activity not initialised".into(),
        ));
    }
    // SAFETY: the NDK guarantees this pointer is a valid global jobject for
    // the hosting Activity.
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Clear any pending Java exception so later JNI calls stay valid.
fn clear_exception(env: &mut JNIEnv) {
    if env.exception_check().unwrap_or(false) {
        let _ = env.exception_clear();
    }
}

/// Map a JNI failure into `HandoffError::Bridge`.
fn jni_err(env: &mut JNIEnv, context: &str, e: jni::errors::Error) -> HandoffError {
    clear_exception(env);
    HandoffError::Bridge(format!("{context}: {e}"))
}

/// Map a JNI failure while opening the source into `UnreadableSource`.
fn unreadable(env: &mut JNIEnv, context: &str, e: jni::errors::Error) -> HandoffError {
    clear_exception(env);
    HandoffError::UnreadableSource(format!("{context}: {e}"))
}

fn java_string(env: &mut JNIEnv, obj: JObject) -> Result<String> {
    let s = JString::from(obj);
    env.get_string(&s)
        .map(String::from)
        .map_err(|e| jni_err(env, "get_string", e))
}

fn parse_uri<'local>(env: &mut JNIEnv<'local>, uri: &str) -> Result<JObject<'local>> {
    let j_uri = env
        .new_string(uri)
        .map_err(|e| jni_err(env, "new_string(uri)", e))?;
    env.call_static_method(
        "android/net/Uri",
        "parse",
        "(Ljava/lang/String;)Landroid/net/Uri;",
        &[JValue::Object(&j_uri)],
    )
    .and_then(|v| v.l())
    .map_err(|e| jni_err(env, "Uri.parse", e))
}

fn content_resolver<'local>(
    env: &mut JNIEnv<'local>,
    activity: &JObject,
) -> Result<JObject<'local>> {
    env.call_method(
        activity,
        "getContentResolver",
        "()Landroid/content/ContentResolver;",
        &[],
    )
    .and_then(|v| v.l())
    .map_err(|e| jni_err(env, "getContentResolver", e))
}

/// Ask the provider for `OpenableColumns.DISPLAY_NAME`. Any failure yields
/// `None`; the caller falls back to the URI's last path segment.
fn query_display_name(env: &mut JNIEnv, resolver: &JObject, uri: &JObject) -> Option<String> {
    let null = JObject::null();
    let cursor = match env
        .call_method(
            resolver,
            "query",
            "(Landroid/net/Uri;[Ljava/lang/String;Ljava/lang/String;[Ljava/lang/String;Ljava/lang/String;)Landroid/database/Cursor;",
            &[
                JValue::Object(uri),
                JValue::Object(&null),
                JValue::Object(&null),
                JValue::Object(&null),
                JValue::Object(&null),
            ],
        )
        .and_then(|v| v.l())
    {
        Ok(cursor) if !cursor.is_null() => cursor,
        Ok(_) => return None,
        Err(e) => {
            clear_exception(env);
            tracing::debug!(error = %e, "Android: display-name query failed");
            return None;
        }
    };

    let name = read_display_name(env, &cursor);
    clear_exception(env);
    let _ = env.call_method(&cursor, "close", "()V", &[]);
    clear_exception(env);
    name
}

fn read_display_name(env: &mut JNIEnv, cursor: &JObject) -> Option<String> {
    let has_row = env
        .call_method(cursor, "moveToFirst", "()Z", &[])
        .and_then(|v| v.z())
        .ok()?;
    if !has_row {
        return None;
    }
    let column = env.new_string(DISPLAY_NAME_COLUMN).ok()?;
    let index = env
        .call_method(
            cursor,
            "getColumnIndex",
            "(Ljava/lang/String;)I",
            &[JValue::Object(&column)],
        )
        .and_then(|v| v.i())
        .ok()?;
    if index < 0 {
        return None;
    }
    let value = env
        .call_method(cursor, "getString", "(I)Ljava/lang/String;", &[JValue::Int(index)])
        .and_then(|v| v.l())
        .ok()?;
    if value.is_null() {
        return None;
    }
    java_string(env, value).ok()
}

// ---------------------------------------------------------------------------
// java.io.InputStream as std::io::Read
// ---------------------------------------------------------------------------

/// A Java `InputStream` read in chunks through a reusable `byte[]`.
/// Closed on drop.
struct JavaInputStream {
    env: JNIEnv<'static>,
    stream: JObject<'static>,
    buffer: JByteArray<'static>,
}

impl JavaInputStream {
    fn new(mut env: JNIEnv<'static>, stream: JObject<'static>) -> Result<Self> {
        let buffer = env
            .new_byte_array(READ_CHUNK)
            .map_err(|e| jni_err(&mut env, "new_byte_array", e))?;
        Ok(Self {
            env,
            stream,
            buffer,
        })
    }
}

impl Read for JavaInputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let want = buf.len().min(READ_CHUNK as usize) as i32;
        let read = self
            .env
            .call_method(
                &self.stream,
                "read",
                "([BII)I",
                &[JValue::Object(&self.buffer), JValue::Int(0), JValue::Int(want)],
            )
            .and_then(|v| v.i());
        let read = match read {
            Ok(n) => n,
            Err(e) => {
                clear_exception(&mut self.env);
                return Err(io::Error::other(format!("InputStream.read: {e}")));
            }
        };
        // -1 is end of stream.
        if read <= 0 {
            return Ok(0);
        }

        let n = read as usize;
        let mut chunk: Vec<jbyte> = vec![0; n];
        if let Err(e) = self.env.get_byte_array_region(&self.buffer, 0, &mut chunk) {
            clear_exception(&mut self.env);
            return Err(io::Error::other(format!("get_byte_array_region: {e}")));
        }
        for (dst, src) in buf.iter_mut().zip(&chunk) {
            *dst = *src as u8;
        }
        Ok(n)
    }
}

impl Drop for JavaInputStream {
    fn drop(&mut self) {
        if self
            .env
            .call_method(&self.stream, "close", "()V", &[])
            .is_err()
        {
            clear_exception(&mut self.env);
        }
    }
}

// ---------------------------------------------------------------------------
// Intent normalisation
// ---------------------------------------------------------------------------

/// Extract the shared file reference from an `Intent`.
///
/// `getData()` wins (view/open); otherwise the `EXTRA_STREAM` parcelable of a
/// share action is used. Returns `Ok(None)` when the intent carries neither.
pub fn reference_from_intent(
    env: &mut JNIEnv,
    intent: &JObject,
) -> Result<Option<(FileReference, IntakeAction)>> {
    let data = env
        .call_method(intent, "getData", "()Landroid/net/Uri;", &[])
        .and_then(|v| v.l())
        .map_err(|e| jni_err(env, "Intent.getData", e))?;

    let (uri, action) = if !data.is_null() {
        (data, IntakeAction::View)
    } else {
        let key = env
            .new_string(EXTRA_STREAM)
            .map_err(|e| jni_err(env, "new_string(EXTRA_STREAM)", e))?;
        let extra = env
            .call_method(
                intent,
                "getParcelableExtra",
                "(Ljava/lang/String;)Landroid/os/Parcelable;",
                &[JValue::Object(&key)],
            )
            .and_then(|v| v.l())
            .map_err(|e| jni_err(env, "Intent.getParcelableExtra", e))?;
        if extra.is_null() {
            return Ok(None);
        }
        (extra, IntakeAction::Send)
    };

    let text = env
        .call_method(&uri, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .map_err(|e| jni_err(env, "Uri.toString", e))?;
    let text = java_string(env, text)?;
    Ok(Some((FileReference::new(text), action)))
}

/// Build the intake event for an `Intent` the Activity received.
///
/// Host glue passes `Arrival::Cold` for the launch intent and `Arrival::Warm`
/// from `onNewIntent`, then hands the event to `IntakeComponent::process`.
pub fn event_from_intent(
    env: &mut JNIEnv,
    intent: &JObject,
    arrival: Arrival,
) -> Result<Option<DeliveryEvent>> {
    Ok(reference_from_intent(env, intent)?
        .map(|(reference, action)| DeliveryEvent::new(reference, arrival, action)))
}

// ---------------------------------------------------------------------------
// Bridge struct
// ---------------------------------------------------------------------------

/// Android implementation of the platform bridge.
///
/// The struct is zero-sized; all state lives on the Java side.
pub struct AndroidBridge;

impl AndroidBridge {
    /// Create a new Android bridge.
    ///
    /// This does **not** touch JNI — the first JNI call happens lazily when
    /// a trait method is invoked.
    pub fn new() -> Self {
        Self
    }
}

impl Default for AndroidBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformBridge for AndroidBridge {
    fn platform_name(&self) -> &str {
        "Android"
    }
}

impl SourceOpener for AndroidBridge {
    /// Open a `content://` (or `file://`) URI through the `ContentResolver`.
    fn open_source(&self, reference: &FileReference) -> Result<OpenedSource> {
        let mut env = jni_env()?;
        let activity = activity()?;

        tracing::info!(uri = %reference, "Android: opening shared URI");

        let uri = parse_uri(&mut env, reference.as_str())?;
        let resolver = content_resolver(&mut env, &activity)?;

        let stream = env
            .call_method(
                &resolver,
                "openInputStream",
                "(Landroid/net/Uri;)Ljava/io/InputStream;",
                &[JValue::Object(&uri)],
            )
            .and_then(|v| v.l())
            .map_err(|e| unreadable(&mut env, "openInputStream", e))?;
        if stream.is_null() {
            return Err(HandoffError::UnreadableSource(format!(
                "ContentResolver returned null InputStream for URI: {reference}"
            )));
        }

        let display_name = query_display_name(&mut env, &resolver, &uri);
        let reader = JavaInputStream::new(env, stream)?;
        Ok(OpenedSource::new(reader).with_display_name(display_name))
    }
}

impl CacheLocator for AndroidBridge {
    /// `Context.getCacheDir()`, private to the app.
    fn cache_root(&self) -> Result<PathBuf> {
        let mut env = jni_env()?;
        let activity = activity()?;

        let cache_dir = env
            .call_method(&activity, "getCacheDir", "()Ljava/io/File;", &[])
            .and_then(|v| v.l())
            .map_err(|e| jni_err(&mut env, "getCacheDir", e))?;
        let path = env
            .call_method(&cache_dir, "getAbsolutePath", "()Ljava/lang/String;", &[])
            .and_then(|v| v.l())
            .map_err(|e| jni_err(&mut env, "File.getAbsolutePath", e))?;
        Ok(PathBuf::from(java_string(&mut env, path)?))
    }
}
