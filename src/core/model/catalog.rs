use std::fmt;
use std::str::FromStr;

use crate::core::Error;

macro_rules! model_catalog {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $display:literal,)+ }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $display,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|m| m.name() == name)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_name(s).ok_or_else(|| Error::UnrecognizedIdentity(s.to_string()))
            }
        }
    };
}

model_catalog! {
    /// Text generation models.
    TextModel {
        Phi35MiniInstruct4bit => "Phi-3.5-mini-instruct-4bit",
        SmolLm17bFp16 => "SmolLM-1.7B-fp16",
        JosiefiedQwen25_14bInstructAbliteratedV4 => "Josiefied-Qwen2.5-14B-Instruct-abliterated-v4",
        QwqPreview32bBf16 => "QwQ-32B-Preview-bf16",
        Yi15_34bChat8bit => "Yi-1.5-34B-Chat-8bit",
        Qwq32bBf16 => "QwQ-32B-bf16",
        JinaaiReaderLmV2 => "jinaai-ReaderLM-v2",
        MistralNemoInstruct2407Bf16 => "Mistral-Nemo-Instruct-2407-bf16",
        Qwen25_14bInstruct1mBf16 => "Qwen2.5-14B-Instruct-1M-bf16",
        MistralSmall24bInstruct2501Bf16 => "Mistral-Small-24B-Instruct-2501-bf16",
        Qwen25_32bInstructBf16 => "Qwen2.5-32B-Instruct-bf16",
        Mixtral8x22bInstructV01_8bit => "Mixtral-8x22B-Instruct-v0.1-8bit",
        Qwen25Coder32bInstructBf16 => "Qwen2.5-Coder-32B-Instruct-bf16",
        Olmoe1b7b0125Instruct => "OLMoE-1B-7B-0125-Instruct",
        MambaCodestral7bV01 => "Mamba-Codestral-7B-v0.1",
    }
}

model_catalog! {
    /// Vision-language models.
    VisionModel {
        Florence2LargeFtBf16 => "Florence-2-large-ft-bf16",
        Qwen25Vl32bInstructBf16 => "Qwen2.5-VL-32B-Instruct-bf16",
        OlmOcr7b0225PreviewBf16 => "olmOCR-7B-0225-preview-bf16",
        Molmo7bD0924Bf16 => "Molmo-7B-D-0924-bf16",
        SmolVlmInstructBf16 => "SmolVLM-Instruct-bf16",
    }
}

model_catalog! {
    /// Audio models, both speech recognition and speech synthesis.
    AudioModel {
        Kokoro82mBf16 => "Kokoro-82M-bf16",
        WhisperLargeV3Mlx => "whisper-large-v3-mlx",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioTask {
    Transcription,
    Synthesis,
}

impl AudioModel {
    pub fn task(&self) -> AudioTask {
        match self {
            AudioModel::WhisperLargeV3Mlx => AudioTask::Transcription,
            AudioModel::Kokoro82mBf16 => AudioTask::Synthesis,
        }
    }
}
