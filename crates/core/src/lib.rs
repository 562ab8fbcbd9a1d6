//! Real-time facial expression pipeline.
//!
//! Frames flow from a [`capture`] source through face [`detection`],
//! [`preprocessing`] and [`classification`]; the [`pipeline`] coordinator
//! sequences the stages, drops frames while busy and hands immutable
//! results to the presentation side.

pub mod shared {
    pub mod constants;
    pub mod execution_provider;
    pub mod face_region;
    pub mod frame;
    pub mod model_resolver;
}

pub mod capture {
    pub mod domain {
        pub mod camera_position;
        pub mod capture_device;
        pub mod capture_error;
        pub mod device_selector;
        pub mod frame_source;
        pub mod orientation;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_locator;
    }
    pub mod infrastructure;
}

pub mod preprocessing {
    pub mod domain {
        pub mod preprocessed_buffer;
        pub mod region_preprocessor;
    }
}

pub mod classification {
    pub mod domain {
        pub mod emotion;
        pub mod emotion_classifier;
    }
    pub mod infrastructure {
        pub mod onnx_emotion_classifier;
    }
}

pub mod pipeline {
    pub mod emotion_result;
    pub mod pipeline_config;
    pub mod pipeline_coordinator;
    pub mod pipeline_logger;
    pub mod pipeline_state;
    pub mod presentation;
    pub mod infrastructure {
        pub mod threaded_emotion_pipeline;
    }
}
