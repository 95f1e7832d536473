//! GLSL compilation and program linking.

use crate::api as gl;
use crate::api::types::*;
use crate::api::Gl;
use std::error::Error;
use std::fmt;

/// Compile or link failure, carrying the driver's info log.
#[derive(Debug)]
pub struct ShaderError(pub String);

impl fmt::Display for ShaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Error for ShaderError {}

fn shader_info_log(gl: &Gl, obj: GLuint) -> String {
    unsafe {
        let mut log_size = 0;
        gl.GetShaderiv(obj, gl::INFO_LOG_LENGTH, &mut log_size);

        let mut log_buf = vec![0u8; log_size as usize];
        gl.GetShaderInfoLog(
            obj,
            log_size,
            &mut log_size,
            log_buf.as_mut_ptr() as *mut GLchar,
        );
        log_buf.truncate(log_size as usize);

        String::from_utf8_lossy(&log_buf).into_owned()
    }
}

fn program_info_log(gl: &Gl, obj: GLuint) -> String {
    unsafe {
        let mut log_size = 0;
        gl.GetProgramiv(obj, gl::INFO_LOG_LENGTH, &mut log_size);

        let mut log_buf = vec![0u8; log_size as usize];
        gl.GetProgramInfoLog(
            obj,
            log_size,
            &mut log_size,
            log_buf.as_mut_ptr() as *mut GLchar,
        );
        log_buf.truncate(log_size as usize);

        String::from_utf8_lossy(&log_buf).into_owned()
    }
}

fn compile_stage(gl: &Gl, stage: GLenum, source: &str) -> Result<GLuint, ShaderError> {
    unsafe {
        let obj = gl.CreateShader(stage);
        let sources = [source.as_ptr() as *const GLchar];
        let lengths = [source.len() as GLint];

        gl.ShaderSource(obj, 1, sources.as_ptr(), lengths.as_ptr());
        gl.CompileShader(obj);

        let mut status = 0;
        gl.GetShaderiv(obj, gl::COMPILE_STATUS, &mut status);

        if status != GLint::from(gl::TRUE) {
            let log = shader_info_log(gl, obj);
            gl.DeleteShader(obj);

            return Err(ShaderError(log));
        }

        Ok(obj)
    }
}

/// Compiles both stages and links them into a program. Stage objects are
/// detached and deleted whatever the outcome.
pub(crate) fn link_program(
    gl: &Gl,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<GLuint, ShaderError> {
    let vertex_obj = compile_stage(gl, gl::VERTEX_SHADER, vertex_source)?;

    let fragment_obj = match compile_stage(gl, gl::FRAGMENT_SHADER, fragment_source) {
        Ok(obj) => obj,
        Err(error) => {
            unsafe { gl.DeleteShader(vertex_obj) };
            return Err(error);
        }
    };

    unsafe {
        let program = gl.CreateProgram();

        gl.AttachShader(program, vertex_obj);
        gl.AttachShader(program, fragment_obj);
        gl.LinkProgram(program);
        gl.DetachShader(program, vertex_obj);
        gl.DetachShader(program, fragment_obj);
        gl.DeleteShader(vertex_obj);
        gl.DeleteShader(fragment_obj);

        let mut status = 0;
        gl.GetProgramiv(program, gl::LINK_STATUS, &mut status);

        if status != GLint::from(gl::TRUE) {
            let log = program_info_log(gl, program);
            gl.DeleteProgram(program);

            return Err(ShaderError(log));
        }

        Ok(program)
    }
}
