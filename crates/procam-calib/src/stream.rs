//! Frame-at-a-time capture loop.
//!
//! A [`Streamer`] pulls frames from a [`FrameSource`], hands each one to a
//! [`FrameConsumer`], then polls a [`KeySource`] once. The consumer gets the
//! first chance to handle a key; an unhandled `q` or ESC stops the loop, as
//! does an exhausted source. [`FrameConsumer::on_stop`] always runs.

use std::collections::VecDeque;

use procam_core::GrayImage;

/// Operator key press.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Space,
    Right,
    Escape,
    Char(char),
}

impl Key {
    /// Decode a raw 8-bit key code as reported by common HighGUI-style
    /// window backends (`3` is the right arrow).
    pub fn from_code(code: u32) -> Option<Key> {
        match code {
            32 => Some(Key::Space),
            3 => Some(Key::Right),
            27 => Some(Key::Escape),
            c => char::from_u32(c)
                .filter(|c| c.is_ascii_graphic())
                .map(Key::Char),
        }
    }

    #[inline]
    pub fn is_quit(self) -> bool {
        matches!(self, Key::Escape | Key::Char('q'))
    }

    /// Space or right arrow.
    #[inline]
    pub fn is_capture(self) -> bool {
        matches!(self, Key::Space | Key::Right)
    }
}

/// Source of grayscale frames (camera, movie, image list).
pub trait FrameSource {
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<GrayImage>;
}

/// Non-blocking key input.
pub trait KeySource {
    fn poll(&mut self) -> Option<Key>;
}

/// Callbacks driven by [`Streamer::run`].
pub trait FrameConsumer {
    fn on_start(&mut self) {}

    fn on_frame(&mut self, frame: &GrayImage);

    /// Return `true` when the key was handled.
    fn on_key(&mut self, _key: Key) -> bool {
        false
    }

    fn on_stop(&mut self) {}
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn next_frame(&mut self) -> Option<GrayImage> {
        (**self).next_frame()
    }
}

impl<T: KeySource + ?Sized> KeySource for &mut T {
    fn poll(&mut self) -> Option<Key> {
        (**self).poll()
    }
}

/// Frames taken from any iterator, e.g. images decoded from disk.
#[derive(Debug)]
pub struct IterFrames<I>(pub I);

impl<I: Iterator<Item = GrayImage>> FrameSource for IterFrames<I> {
    fn next_frame(&mut self) -> Option<GrayImage> {
        self.0.next()
    }
}

/// Key source that never reports a key.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoKeys;

impl KeySource for NoKeys {
    fn poll(&mut self) -> Option<Key> {
        None
    }
}

/// Replays one entry per poll; `None` entries are frames without a key.
#[derive(Clone, Debug, Default)]
pub struct ScriptedKeys {
    script: VecDeque<Option<Key>>,
}

impl ScriptedKeys {
    pub fn new(script: impl IntoIterator<Item = Option<Key>>) -> Self {
        Self {
            script: script.into_iter().collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll(&mut self) -> Option<Key> {
        self.script.pop_front().flatten()
    }
}

/// Why [`Streamer::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    SourceExhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamStats {
    pub frames: usize,
    pub stop: StopReason,
}

pub struct Streamer<F, K> {
    frames: F,
    keys: K,
}

impl<F: FrameSource, K: KeySource> Streamer<F, K> {
    pub fn new(frames: F, keys: K) -> Self {
        Self { frames, keys }
    }

    pub fn run<C: FrameConsumer + ?Sized>(&mut self, consumer: &mut C) -> StreamStats {
        consumer.on_start();

        let mut frames = 0;
        let stop = loop {
            let Some(frame) = self.frames.next_frame() else {
                break StopReason::SourceExhausted;
            };
            frames += 1;
            consumer.on_frame(&frame);

            if let Some(key) = self.keys.poll() {
                if !consumer.on_key(key) && key.is_quit() {
                    break StopReason::QuitKey;
                }
            }
        };

        consumer.on_stop();
        log::debug!("stream stopped after {frames} frames ({stop:?})");
        StreamStats { frames, stop }
    }

    pub fn into_parts(self) -> (F, K) {
        (self.frames, self.keys)
    }
}
