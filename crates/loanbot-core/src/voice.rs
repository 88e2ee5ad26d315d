//! Voice input and spoken output.
//!
//! Recognition and synthesis engines are opaque capabilities behind two
//! traits. The bundled implementations shell out to user-configured
//! programs, so any local STT/TTS tool can be plugged in.

use async_trait::async_trait;
use regex::Regex;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

use crate::config::CommandSpec;
use crate::error::{Error, Result};

pub const LOCALE_EN_IN: &str = "en-IN";
pub const LOCALE_HI_IN: &str = "hi-IN";

/// Recognition stops on its own after this long.
pub const MAX_LISTEN: Duration = Duration::from_secs(6);

static HINDI_HINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(chahiye|loan|ghar|mujhe|kar|len|jankari|bataye|batao)")
        .expect("Invalid locale regex")
});

/// Pick the recognition locale for the next capture from the last transcript.
///
/// Devanagari script or common romanized Hindi phrases switch to `hi-IN`.
pub fn detect_locale(transcript: &str) -> &'static str {
    let devanagari = transcript
        .chars()
        .any(|c| ('\u{0900}'..='\u{097F}').contains(&c));

    if devanagari || HINDI_HINTS.is_match(transcript) {
        LOCALE_HI_IN
    } else {
        LOCALE_EN_IN
    }
}

#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Listen once and return the transcript, or `None` if nothing was heard.
    async fn listen(&self, locale: &str, max_duration: Duration) -> Result<Option<String>>;
}

pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `text`, interrupting anything currently being spoken.
    fn speak(&self, text: &str, locale: &str) -> Result<()>;

    /// Stop any active speech.
    fn cancel(&self);
}

/// Resets the listening flag even if the capture future is dropped.
struct ListeningGuard<'a>(&'a AtomicBool);

impl Drop for ListeningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Speech capture with locale switching.
pub struct VoiceCapture {
    recognizer: Arc<dyn SpeechRecognizer>,
    locale: Mutex<&'static str>,
    listening: AtomicBool,
    max_duration: Duration,
}

impl VoiceCapture {
    pub fn new(recognizer: Arc<dyn SpeechRecognizer>) -> Self {
        Self {
            recognizer,
            locale: Mutex::new(LOCALE_EN_IN),
            listening: AtomicBool::new(false),
            max_duration: MAX_LISTEN,
        }
    }

    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn locale(&self) -> &'static str {
        self.locale.lock().map(|l| *l).unwrap_or(LOCALE_EN_IN)
    }

    /// Run one recognition pass.
    ///
    /// The detected locale applies to the next capture, not this one.
    pub async fn capture(&self) -> Result<Option<String>> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(Error::Voice("already listening".to_string()));
        }
        let _guard = ListeningGuard(&self.listening);

        let locale = self.locale();
        tracing::info!(locale, "Listening");
        let heard = self.recognizer.listen(locale, self.max_duration).await?;

        let transcript = heard
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        if let Some(text) = &transcript {
            let next = detect_locale(text);
            if let Ok(mut current) = self.locale.lock() {
                *current = next;
            }
            tracing::debug!(next_locale = next, "Transcript received");
        }
        Ok(transcript)
    }
}

/// Runs an external program and reads the transcript from its stdout.
///
/// `{locale}` in the arguments is replaced with the active locale.
pub struct CommandRecognizer {
    spec: CommandSpec,
}

impl CommandRecognizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    async fn listen(&self, locale: &str, max_duration: Duration) -> Result<Option<String>> {
        let args = self.spec.args_with(&[("{locale}", locale)]);
        let child = tokio::process::Command::new(&self.spec.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Voice(format!("failed to start {}: {}", self.spec.program, e)))?;

        match tokio::time::timeout(max_duration, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                if !output.status.success() {
                    return Err(Error::Voice(format!(
                        "{} exited with {}",
                        self.spec.program, output.status
                    )));
                }
                let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Ok(if text.is_empty() { None } else { Some(text) })
            }
            Err(_) => {
                tracing::info!("Recognition timed out after {:?}", max_duration);
                Ok(None)
            }
        }
    }
}

/// Speaks through an external program, text passed as the last argument.
pub struct CommandSynthesizer {
    spec: CommandSpec,
    current: Mutex<Option<Child>>,
}

impl CommandSynthesizer {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            current: Mutex::new(None),
        }
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn speak(&self, text: &str, locale: &str) -> Result<()> {
        self.cancel();

        let mut args = self.spec.args_with(&[("{locale}", locale)]);
        args.push(text.to_string());

        let child = Command::new(&self.spec.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Voice(format!("failed to start {}: {}", self.spec.program, e)))?;

        if let Ok(mut current) = self.current.lock() {
            *current = Some(child);
        }
        Ok(())
    }

    fn cancel(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(mut child) = current.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl Drop for CommandSynthesizer {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Used when text-to-speech is not configured.
pub struct NoopSynthesizer;

impl SpeechSynthesizer for NoopSynthesizer {
    fn speak(&self, _text: &str, _locale: &str) -> Result<()> {
        Ok(())
    }

    fn cancel(&self) {}
}

/// Plays server-provided audio replies. `{url}` is substituted, otherwise
/// the URL is appended. A new reply stops the one still playing.
pub struct AudioPlayer {
    spec: CommandSpec,
    current: Mutex<Option<Child>>,
}

impl AudioPlayer {
    pub fn new(spec: CommandSpec) -> Self {
        Self {
            spec,
            current: Mutex::new(None),
        }
    }

    pub fn play(&self, url: &str) -> Result<()> {
        self.stop();

        let mut args = self.spec.args_with(&[("{url}", url)]);
        if !self.spec.args.iter().any(|a| a.contains("{url}")) {
            args.push(url.to_string());
        }

        let child = Command::new(&self.spec.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Voice(format!("failed to start {}: {}", self.spec.program, e)))?;

        if let Ok(mut current) = self.current.lock() {
            *current = Some(child);
        }
        Ok(())
    }

    pub fn is_playing(&self) -> bool {
        let Ok(mut current) = self.current.lock() else {
            return false;
        };
        match current.as_mut().map(|child| child.try_wait()) {
            Some(Ok(None)) => true,
            Some(_) => {
                // Exited, and try_wait reaped it
                current.take();
                false
            }
            None => false,
        }
    }

    /// Kill and reap the current playback, if any.
    pub fn stop(&self) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(mut child) = current.take() {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedRecognizer {
        reply: Option<String>,
        seen_locales: Mutex<Vec<String>>,
    }

    impl ScriptedRecognizer {
        fn new(reply: Option<&str>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                seen_locales: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for ScriptedRecognizer {
        async fn listen(&self, locale: &str, _max: Duration) -> Result<Option<String>> {
            self.seen_locales.lock().unwrap().push(locale.to_string());
            Ok(self.reply.clone())
        }
    }

    struct PendingRecognizer;

    #[async_trait]
    impl SpeechRecognizer for PendingRecognizer {
        async fn listen(&self, _locale: &str, _max: Duration) -> Result<Option<String>> {
            std::future::pending::<()>().await;
            Ok(None)
        }
    }

    #[test]
    fn test_detect_locale_english() {
        assert_eq!(detect_locale("What is my eligibility?"), LOCALE_EN_IN);
    }

    #[test]
    fn test_detect_locale_devanagari() {
        assert_eq!(detect_locale("मुझे जानकारी चाहिए"), LOCALE_HI_IN);
    }

    #[test]
    fn test_detect_locale_romanized_hints() {
        assert_eq!(detect_locale("Mujhe ghar ke liye paisa chahiye"), LOCALE_HI_IN);
        assert_eq!(detect_locale("BATAO"), LOCALE_HI_IN);
        // "loan" counts as a hint, so most loan talk flips the locale
        assert_eq!(detect_locale("I need a loan"), LOCALE_HI_IN);
    }

    #[tokio::test]
    async fn test_capture_switches_locale_for_next_pass() {
        let recognizer = Arc::new(ScriptedRecognizer::new(Some("  mujhe loan chahiye ")));
        let capture = VoiceCapture::new(recognizer.clone());

        let first = capture.capture().await.unwrap();
        assert_eq!(first.as_deref(), Some("mujhe loan chahiye"));
        assert_eq!(capture.locale(), LOCALE_HI_IN);

        capture.capture().await.unwrap();
        let seen = recognizer.seen_locales.lock().unwrap().clone();
        assert_eq!(seen, vec!["en-IN".to_string(), "hi-IN".to_string()]);
        assert!(!capture.is_listening());
    }

    #[tokio::test]
    async fn test_capture_empty_transcript_is_none() {
        let capture = VoiceCapture::new(Arc::new(ScriptedRecognizer::new(Some("   "))));
        assert_eq!(capture.capture().await.unwrap(), None);
        assert_eq!(capture.locale(), LOCALE_EN_IN);
    }

    #[tokio::test]
    async fn test_capture_rejects_concurrent_listen() {
        let capture = Arc::new(VoiceCapture::new(Arc::new(PendingRecognizer)));

        let background = {
            let capture = capture.clone();
            tokio::spawn(async move { capture.capture().await })
        };
        tokio::task::yield_now().await;
        while !capture.is_listening() {
            tokio::task::yield_now().await;
        }

        let err = capture.capture().await.unwrap_err();
        assert!(err.to_string().contains("already listening"));

        background.abort();
        let _ = background.await;
        assert!(!capture.is_listening());
    }

    #[tokio::test]
    async fn test_command_recognizer_reads_stdout() {
        let recognizer = CommandRecognizer::new(CommandSpec {
            program: "echo".to_string(),
            args: vec!["heard".to_string(), "{locale}".to_string()],
        });
        let text = recognizer.listen("hi-IN", Duration::from_secs(5)).await.unwrap();
        assert_eq!(text.as_deref(), Some("heard hi-IN"));
    }

    #[tokio::test]
    async fn test_command_recognizer_times_out() {
        let recognizer = CommandRecognizer::new(CommandSpec {
            program: "sleep".to_string(),
            args: vec!["5".to_string()],
        });
        let text = recognizer
            .listen("en-IN", Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(text, None);
    }

    #[test]
    fn test_noop_synthesizer() {
        let synth = NoopSynthesizer;
        assert!(synth.speak("hello", LOCALE_EN_IN).is_ok());
        synth.cancel();
    }

    #[test]
    fn test_audio_player_replaces_and_stops_playback() {
        let player = AudioPlayer::new(CommandSpec {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), "sleep 5".to_string(), "{url}".to_string()],
        });

        player.play("http://server/static/a.mp3").unwrap();
        assert!(player.is_playing());
        player.play("http://server/static/b.mp3").unwrap();
        assert!(player.is_playing());

        player.stop();
        assert!(!player.is_playing());
    }

    #[test]
    fn test_audio_player_reaps_finished_playback() {
        let player = AudioPlayer::new(CommandSpec {
            program: "true".to_string(),
            args: Vec::new(),
        });
        player.play("http://server/static/a.mp3").unwrap();
        std::thread::sleep(Duration::from_millis(200));
        assert!(!player.is_playing());
        assert!(player.current.lock().unwrap().is_none());
    }

    #[test]
    fn test_command_synthesizer_missing_program() {
        let synth = CommandSynthesizer::new(CommandSpec {
            program: "definitely-not-a-real-tts-binary".to_string(),
            args: Vec::new(),
        });
        let err = synth.speak("hello", LOCALE_EN_IN).unwrap_err();
        assert!(matches!(err, Error::Voice(_)));
    }
}
