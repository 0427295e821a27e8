use mlua::{Lua, Result as LuaResult};

use crate::media::MediaHandle;
use crate::slots::Handle;

pub(super) fn install_media_functions(lua: &Lua, media: MediaHandle) -> LuaResult<()> {
    let globals = lua.globals();

    let play_media = media.clone();
    globals.set(
        "play",
        lua.create_function(move |_, handle: Handle| {
            // Rejected handles are already reported by the media context.
            let _ = play_media.borrow_mut().play(handle, false);
            Ok(())
        })?,
    )?;

    let loop_media = media.clone();
    globals.set(
        "loop",
        lua.create_function(move |_, handle: Handle| {
            let _ = loop_media.borrow_mut().play(handle, true);
            Ok(())
        })?,
    )?;

    let stop_media = media.clone();
    globals.set(
        "stop",
        lua.create_function(move |_, handle: Handle| {
            let _ = stop_media.borrow_mut().stop(handle);
            Ok(())
        })?,
    )?;

    globals.set(
        "display",
        lua.create_function(move |_, handle: Handle| {
            let _ = media.borrow_mut().display(handle);
            Ok(())
        })?,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::{AudioRequest, Framebuffer, RecordingAudio};
    use crate::backend::MediaLoader;
    use crate::media::MediaContext;
    use crate::slots::SlotKind;
    use anyhow::Result;
    use joy_formats::{AudioClip, Bitmap};
    use std::path::Path;

    struct TinyLoader;

    impl MediaLoader for TinyLoader {
        fn load_audio(&self, _path: &Path) -> Result<AudioClip> {
            Ok(AudioClip::new(vec![[1, 1]; 4]))
        }

        fn load_image(&self, _path: &Path) -> Result<Bitmap> {
            Ok(Bitmap::solid(1, 1, [10, 20, 30, 255]))
        }
    }

    #[test]
    fn script_functions_drive_the_media_context() {
        let audio = RecordingAudio::new();
        let display = Framebuffer::new(3, 3);
        let media = MediaContext::new(
            Box::new(audio.clone()),
            Box::new(display.clone()),
            Box::new(TinyLoader),
            false,
        )
        .into_handle();
        media
            .borrow_mut()
            .load(SlotKind::Audio, 2, Path::new("a.wav"))
            .unwrap();
        media
            .borrow_mut()
            .load(SlotKind::Image, 4, Path::new("a.png"))
            .unwrap();

        let lua = Lua::new();
        install_media_functions(&lua, media.clone()).unwrap();
        lua.load("play(2) loop(2) stop(2) play(99) stop(-1) display(4) display(16)")
            .exec()
            .unwrap();

        assert_eq!(
            audio.requests(),
            vec![
                AudioRequest::Play {
                    channel: 2,
                    frames: Some(4),
                    looping: false,
                },
                AudioRequest::Play {
                    channel: 2,
                    frames: Some(4),
                    looping: true,
                },
                AudioRequest::Halt { channel: 2 },
            ]
        );
        assert_eq!(display.present_count(), 1);
        assert_eq!(display.snapshot().pixel(2, 2), Some([10, 20, 30, 255]));
    }

    #[test]
    fn non_integer_handle_raises_a_lua_error() {
        let media = MediaContext::new(
            Box::new(RecordingAudio::new()),
            Box::new(Framebuffer::new(1, 1)),
            Box::new(TinyLoader),
            false,
        )
        .into_handle();
        let lua = Lua::new();
        install_media_functions(&lua, media).unwrap();
        assert!(lua.load("play('loud')").exec().is_err());
    }
}
